//! Shared vocabulary for the two cache tiers.
//!
//! The memory tier reports removals through an [`EvictionObserver`]; the
//! caller picks a [`RemovalMode`] per removal so the observer fires only for
//! removals that count as evictions. Both tiers expose metric snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// How a removal from the memory tier is reported.
///
/// Capacity-driven evictions always use [`RemovalMode::AutomaticEviction`].
/// Callers removing entries they own (an explicit delete) pass
/// [`RemovalMode::ExplicitRemoval`] and the observer is not invoked. The mode
/// travels with the removal call, so concurrent removals never share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalMode {
    AutomaticEviction,
    ExplicitRemoval,
}

impl RemovalMode {
    #[inline]
    pub fn notifies(self) -> bool {
        matches!(self, RemovalMode::AutomaticEviction)
    }
}

/// Receives entries discarded by the memory tier.
///
/// Called synchronously on the thread that caused the removal, while the
/// store's lock is held. Implementations must not call back into the same
/// store and should hand slow work off elsewhere.
pub trait EvictionObserver<K, V>: Send + Sync {
    fn on_evict(&self, key: &K, value: &Arc<V>);
}

impl<K, V, F> EvictionObserver<K, V> for F
where
    F: Fn(&K, &Arc<V>) + Send + Sync,
{
    fn on_evict(&self, key: &K, value: &Arc<V>) {
        self(key, value)
    }
}

/// Snapshot of memory-tier metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    evictions: AtomicU64,
}

impl StoreCounters {
    pub(crate) fn snapshot(&self) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn inc_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_removes(&self, n: u64) {
        self.removes.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_evictions(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
    }
}

/// Snapshot of disk-tier metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskMetrics {
    pub saves: u64,
    pub save_failures: u64,
    pub loads: u64,
    pub load_hits: u64,
    pub deletes: u64,
    pub write_backs: u64,
    pub dropped_write_backs: u64,
    pub retention_removals: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DiskCounters {
    saves: AtomicU64,
    save_failures: AtomicU64,
    loads: AtomicU64,
    load_hits: AtomicU64,
    deletes: AtomicU64,
    write_backs: AtomicU64,
    dropped_write_backs: AtomicU64,
    retention_removals: AtomicU64,
}

impl DiskCounters {
    pub(crate) fn snapshot(&self) -> DiskMetrics {
        DiskMetrics {
            saves: self.saves.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_hits: self.load_hits.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            write_backs: self.write_backs.load(Ordering::Relaxed),
            dropped_write_backs: self.dropped_write_backs.load(Ordering::Relaxed),
            retention_removals: self.retention_removals.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn inc_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_save_failure(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self, hit: bool) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.load_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn inc_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_write_back(&self) {
        self.write_backs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dropped_write_back(&self) {
        self.dropped_write_backs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_retention_removals(&self, n: u64) {
        self.retention_removals.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_automatic_eviction_notifies() {
        assert!(RemovalMode::AutomaticEviction.notifies());
        assert!(!RemovalMode::ExplicitRemoval.notifies());
    }

    #[test]
    fn closures_are_observers() {
        let seen = parking_lot::Mutex::new(Vec::new());
        let observer = |key: &String, value: &Arc<i32>| seen.lock().push((key.clone(), **value));
        observer.on_evict(&"a".to_string(), &Arc::new(1));
        assert_eq!(*seen.lock(), vec![("a".to_string(), 1)]);
    }

    #[test]
    fn disk_counters_snapshot() {
        let counters = DiskCounters::default();
        counters.record_load(true);
        counters.record_load(false);
        counters.inc_dropped_write_back();
        counters.add_retention_removals(3);
        let snap = counters.snapshot();
        assert_eq!(snap.loads, 2);
        assert_eq!(snap.load_hits, 1);
        assert_eq!(snap.dropped_write_backs, 1);
        assert_eq!(snap.retention_removals, 3);
    }
}
