//! # Bounded Memory Store
//!
//! Thread-safe in-memory key/value store bounded by entry count and by
//! aggregate cost. When an insert pushes the store over either limit it
//! evicts least-recently-used entries until both limits hold again, and
//! reports each victim to the registered [`EvictionObserver`].
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                     BoundedMemoryStore<K, V>                         │
//!   │                                                                      │
//!   │   observer: RwLock<Option<Arc<dyn EvictionObserver<K, V>>>>          │
//!   │                                                                      │
//!   │   core: Mutex<MemoryCore<K, V>>                                      │
//!   │   ┌────────────────────────────────────────────────────────────────┐ │
//!   │   │  FxHashMap<K, SlotId>                                          │ │
//!   │   │        │                                                       │ │
//!   │   │        ▼                                                       │ │
//!   │   │  RecencyList<Entry { key, value: Arc<V>, cost }>               │ │
//!   │   │  newest ─► [e3] ◄──► [e1] ◄──► [e2] ◄── oldest (victim)        │ │
//!   │   │                                                                │ │
//!   │   │  total_cost, count_limit, total_cost_limit                     │ │
//!   │   └────────────────────────────────────────────────────────────────┘ │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Eviction order
//!
//! Strict LRU. `set` and `get` make an entry the newest; `peek` does not.
//! Victims are taken from the oldest end one at a time. The entry written by the
//! current `set` is never its own victim: if its cost alone exceeds the cost
//! limit, every other entry is evicted and it stays.
//!
//! A limit of `0` means unbounded.
//!
//! ## Observer contract
//!
//! The observer runs synchronously on the caller's thread, inside the store
//! lock, before `set`/`remove`/`clear` return. Holding the lock means a
//! concurrent removal of the same key cannot be observed before the
//! observer has finished. The observer must not call back into this store.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use tiercache::store::memory::BoundedMemoryStore;
//!
//! let store = BoundedMemoryStore::new("demo", 1, 0);
//! let evicted = Arc::new(Mutex::new(Vec::<(String, &'static str)>::new()));
//! let sink = Arc::clone(&evicted);
//! store.set_observer(move |key: &String, value: &Arc<&'static str>| {
//!     sink.lock().push((key.clone(), **value));
//! });
//!
//! store.set("a".to_string(), "x");
//! store.set("b".to_string(), "y");
//!
//! assert_eq!(*evicted.lock(), vec![("a".to_string(), "x")]);
//! assert!(store.get(&"a".to_string()).is_none());
//! assert_eq!(store.get(&"b".to_string()).as_deref(), Some(&"y"));
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ds::{RecencyList, SlotId};
use crate::store::traits::{EvictionObserver, RemovalMode, StoreCounters, StoreMetrics};

/// Cost charged when the caller does not supply one.
pub const DEFAULT_COST: usize = 1;

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: Arc<V>,
    cost: usize,
}

#[derive(Debug)]
struct MemoryCore<K, V> {
    index: FxHashMap<K, SlotId>,
    order: RecencyList<Entry<K, V>>,
    count_limit: usize,
    total_cost_limit: usize,
    // Wide enough that no sequence of `usize` costs can overflow it.
    total_cost: u128,
}

impl<K, V> MemoryCore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new(count_limit: usize, total_cost_limit: usize) -> Self {
        Self {
            index: FxHashMap::default(),
            order: RecencyList::new(),
            count_limit,
            total_cost_limit,
            total_cost: 0,
        }
    }

    /// Inserts or replaces `key` as the newest entry. Returns `true` for a new key.
    fn upsert(&mut self, key: K, value: Arc<V>, cost: usize) -> bool {
        if let Some(&id) = self.index.get(&key) {
            if let Some(entry) = self.order.get_mut(id) {
                self.total_cost = self.total_cost - entry.cost as u128 + cost as u128;
                entry.value = value;
                entry.cost = cost;
            }
            self.order.touch(id);
            return false;
        }

        let id = self.order.push_newest(Entry {
            key: key.clone(),
            value,
            cost,
        });
        self.index.insert(key, id);
        self.total_cost += cost as u128;
        true
    }

    fn over_limit(&self) -> bool {
        (self.count_limit > 0 && self.order.len() > self.count_limit)
            || (self.total_cost_limit > 0 && self.total_cost > self.total_cost_limit as u128)
    }

    /// Pops the oldest entries until both limits hold, never the newest.
    fn evict_excess(&mut self) -> Vec<Entry<K, V>> {
        let mut victims = Vec::new();
        while self.over_limit() && self.order.len() > 1 {
            match self.order.pop_oldest() {
                Some(entry) => {
                    self.forget(&entry);
                    victims.push(entry);
                },
                None => break,
            }
        }
        victims
    }

    fn lookup(&mut self, key: &K, promote: bool) -> Option<Arc<V>> {
        let id = *self.index.get(key)?;
        if promote {
            self.order.touch(id);
        }
        self.order.get(id).map(|entry| Arc::clone(&entry.value))
    }

    fn take(&mut self, key: &K) -> Option<Entry<K, V>> {
        let id = self.index.remove(key)?;
        let entry = self.order.remove(id)?;
        self.total_cost = self.total_cost.saturating_sub(entry.cost as u128);
        Some(entry)
    }

    /// Removes every entry, least recently used first.
    fn take_all(&mut self) -> Vec<Entry<K, V>> {
        let entries = self.order.drain_oldest_first();
        self.index.clear();
        self.total_cost = 0;
        entries
    }

    fn forget(&mut self, entry: &Entry<K, V>) {
        self.index.remove(&entry.key);
        self.total_cost = self.total_cost.saturating_sub(entry.cost as u128);
    }
}

/// In-memory tier with count/cost limits and eviction notification.
pub struct BoundedMemoryStore<K, V> {
    name: String,
    core: Mutex<MemoryCore<K, V>>,
    observer: RwLock<Option<Arc<dyn EvictionObserver<K, V>>>>,
    metrics: StoreCounters,
}

impl<K, V> BoundedMemoryStore<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates a store. A limit of `0` leaves that dimension unbounded.
    pub fn new(name: impl Into<String>, count_limit: usize, total_cost_limit: usize) -> Self {
        Self {
            name: name.into(),
            core: Mutex::new(MemoryCore::new(count_limit, total_cost_limit)),
            observer: RwLock::new(None),
            metrics: StoreCounters::default(),
        }
    }

    /// Debug label given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs `observer`, replacing any previous one.
    pub fn set_observer<O>(&self, observer: O)
    where
        O: EvictionObserver<K, V> + 'static,
    {
        *self.observer.write() = Some(Arc::new(observer));
    }

    /// Removes the observer; later evictions go unreported.
    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    /// Inserts or replaces `key` with the default cost.
    pub fn set(&self, key: K, value: V) {
        self.set_arc(key, Arc::new(value), DEFAULT_COST);
    }

    /// Inserts or replaces `key` with an explicit cost.
    pub fn set_with_cost(&self, key: K, value: V, cost: usize) {
        self.set_arc(key, Arc::new(value), cost);
    }

    /// Inserts an already shared value.
    ///
    /// May evict other entries; each victim is reported to the observer
    /// before this returns.
    pub fn set_arc(&self, key: K, value: Arc<V>, cost: usize) {
        let mut core = self.core.lock();
        if core.upsert(key, value, cost) {
            self.metrics.inc_insert();
        } else {
            self.metrics.inc_update();
        }
        let victims = core.evict_excess();
        if !victims.is_empty() {
            self.metrics.add_evictions(victims.len() as u64);
            debug!(store = %self.name, evicted = victims.len(), "capacity eviction");
            self.notify(&victims);
        }
    }

    /// Index-style write: `Some` sets, `None` removes (with notification).
    pub fn set_opt(&self, key: K, value: Option<V>) {
        match value {
            Some(value) => self.set(key, value),
            None => {
                self.remove(&key);
            },
        }
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let hit = self.core.lock().lookup(key, true);
        match hit {
            Some(_) => self.metrics.inc_hit(),
            None => self.metrics.inc_miss(),
        }
        hit
    }

    /// Returns the value for `key` without changing eviction order.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.core.lock().lookup(key, false)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.core.lock().index.contains_key(key)
    }

    /// Removes `key`, reporting it to the observer like an eviction.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.remove_with(key, RemovalMode::AutomaticEviction)
    }

    /// Removes `key`; the observer fires only for
    /// [`RemovalMode::AutomaticEviction`].
    pub fn remove_with(&self, key: &K, mode: RemovalMode) -> Option<Arc<V>> {
        let mut core = self.core.lock();
        let entry = core.take(key)?;
        self.metrics.add_removes(1);
        if mode.notifies() {
            self.notify(std::slice::from_ref(&entry));
        }
        Some(entry.value)
    }

    /// Removes every entry, reporting each one to the observer.
    pub fn clear(&self) {
        self.clear_with(RemovalMode::AutomaticEviction);
    }

    /// Removes every entry; the observer fires once per entry only for
    /// [`RemovalMode::AutomaticEviction`].
    pub fn clear_with(&self, mode: RemovalMode) {
        let mut core = self.core.lock();
        let entries = core.take_all();
        self.metrics.add_removes(entries.len() as u64);
        if mode.notifies() {
            self.notify(&entries);
        }
    }

    /// Changes both limits and evicts immediately if the store no longer fits.
    pub fn set_limits(&self, count_limit: usize, total_cost_limit: usize) {
        let mut core = self.core.lock();
        core.count_limit = count_limit;
        core.total_cost_limit = total_cost_limit;
        let victims = core.evict_excess();
        if !victims.is_empty() {
            self.metrics.add_evictions(victims.len() as u64);
            self.notify(&victims);
        }
    }

    pub fn len(&self) -> usize {
        self.core.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of entry costs, saturating at `usize::MAX`.
    pub fn total_cost(&self) -> usize {
        usize::try_from(self.core.lock().total_cost).unwrap_or(usize::MAX)
    }

    pub fn count_limit(&self) -> usize {
        self.core.lock().count_limit
    }

    pub fn total_cost_limit(&self) -> usize {
        self.core.lock().total_cost_limit
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.core
            .lock()
            .order
            .iter()
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let core = self.core.lock();
        core.order.debug_validate_invariants();
        assert_eq!(core.index.len(), core.order.len());
        let cost: u128 = core.order.iter().map(|entry| entry.cost as u128).sum();
        assert_eq!(cost, core.total_cost);
        for entry in core.order.iter() {
            assert!(core.index.contains_key(&entry.key));
        }
    }

    fn notify(&self, entries: &[Entry<K, V>]) {
        let observer = self.observer.read().clone();
        let Some(observer) = observer else {
            return;
        };
        for entry in entries {
            debug!(store = %self.name, key = ?entry.key, "reporting removal");
            observer.on_evict(&entry.key, &entry.value);
        }
    }
}

impl<K, V> fmt::Debug for BoundedMemoryStore<K, V>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("BoundedMemoryStore")
            .field("name", &self.name)
            .field("len", &core.order.len())
            .field("total_cost", &core.total_cost)
            .field("count_limit", &core.count_limit)
            .field("total_cost_limit", &core.total_cost_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<(String, i32)>>>;

    fn observed(store: &BoundedMemoryStore<String, i32>) -> Log {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        store.set_observer(move |key: &String, value: &Arc<i32>| {
            sink.lock().push((key.clone(), **value));
        });
        log
    }

    fn k(s: &str) -> String {
        s.to_string()
    }

    mod basic_behavior {
        use super::*;

        #[test]
        fn set_then_get_returns_value() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            store.set(k("a"), 1);
            assert_eq!(store.get(&k("a")).as_deref(), Some(&1));
            assert_eq!(store.len(), 1);
            assert_eq!(store.total_cost(), DEFAULT_COST);
        }

        #[test]
        fn set_existing_key_replaces_value_and_cost() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            store.set_with_cost(k("a"), 1, 5);
            store.set_with_cost(k("a"), 2, 3);
            assert_eq!(store.get(&k("a")).as_deref(), Some(&2));
            assert_eq!(store.len(), 1);
            assert_eq!(store.total_cost(), 3);
            let metrics = store.metrics();
            assert_eq!(metrics.inserts, 1);
            assert_eq!(metrics.updates, 1);
        }

        #[test]
        fn remove_then_get_is_absent() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            store.set(k("a"), 1);
            assert_eq!(store.remove(&k("a")).as_deref(), Some(&1));
            assert!(store.get(&k("a")).is_none());
            assert!(store.remove(&k("a")).is_none());
        }

        #[test]
        fn clear_empties_store() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            for i in 0..5 {
                store.set(format!("k{i}"), i);
            }
            store.clear();
            assert!(store.is_empty());
            assert_eq!(store.total_cost(), 0);
            for i in 0..5 {
                assert!(store.get(&format!("k{i}")).is_none());
            }
        }

        #[test]
        fn set_opt_none_removes() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            store.set_opt(k("a"), Some(1));
            assert!(store.contains(&k("a")));
            store.set_opt(k("a"), None);
            assert!(!store.contains(&k("a")));
        }

        #[test]
        fn hit_and_miss_metrics() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            store.set(k("a"), 1);
            store.get(&k("a"));
            store.get(&k("b"));
            store.peek(&k("a"));
            let metrics = store.metrics();
            assert_eq!(metrics.hits, 1);
            assert_eq!(metrics.misses, 1);
        }
    }

    mod eviction {
        use super::*;

        #[test]
        fn count_limit_one_evicts_previous_entry() {
            let store = BoundedMemoryStore::new("t", 1, 0);
            let log = observed(&store);

            store.set_with_cost(k("a"), 10, 1);
            store.set_with_cost(k("b"), 20, 1);

            assert_eq!(*log.lock(), vec![(k("a"), 10)]);
            assert!(store.get(&k("a")).is_none());
            assert_eq!(store.get(&k("b")).as_deref(), Some(&20));
            assert_eq!(store.metrics().evictions, 1);
        }

        #[test]
        fn least_recently_used_goes_first() {
            let store = BoundedMemoryStore::new("t", 3, 0);
            let log = observed(&store);
            store.set(k("a"), 1);
            store.set(k("b"), 2);
            store.set(k("c"), 3);

            store.get(&k("a"));
            store.set(k("d"), 4);

            assert_eq!(*log.lock(), vec![(k("b"), 2)]);
            assert_eq!(store.keys_by_recency(), vec![k("d"), k("a"), k("c")]);
        }

        #[test]
        fn peek_does_not_promote() {
            let store = BoundedMemoryStore::new("t", 2, 0);
            let log = observed(&store);
            store.set(k("a"), 1);
            store.set(k("b"), 2);
            store.peek(&k("a"));
            store.set(k("c"), 3);
            assert_eq!(*log.lock(), vec![(k("a"), 1)]);
        }

        #[test]
        fn cost_limit_evicts_until_under_budget() {
            let store = BoundedMemoryStore::new("t", 0, 10);
            let log = observed(&store);
            store.set_with_cost(k("a"), 1, 4);
            store.set_with_cost(k("b"), 2, 4);
            store.set_with_cost(k("c"), 3, 6);

            assert_eq!(*log.lock(), vec![(k("a"), 1), (k("b"), 2)]);
            assert_eq!(store.total_cost(), 6);
        }

        #[test]
        fn oversized_entry_is_never_its_own_victim() {
            let store = BoundedMemoryStore::new("t", 0, 5);
            let log = observed(&store);
            store.set_with_cost(k("a"), 1, 2);
            store.set_with_cost(k("huge"), 2, 50);

            assert_eq!(*log.lock(), vec![(k("a"), 1)]);
            assert_eq!(store.get(&k("huge")).as_deref(), Some(&2));
            assert_eq!(store.len(), 1);
        }

        #[test]
        fn extreme_costs_do_not_overflow() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            store.set_with_cost(k("a"), 1, usize::MAX);
            store.set_with_cost(k("b"), 2, 1);
            assert_eq!(store.total_cost(), usize::MAX);
            store.set_with_cost(k("a"), 3, usize::MAX);
            store.debug_validate_invariants();

            assert!(store.remove(&k("a")).is_some());
            assert_eq!(store.total_cost(), 1);
            store.debug_validate_invariants();
        }

        #[test]
        fn extreme_cost_is_evicted_exactly() {
            let store = BoundedMemoryStore::new("t", 0, 10);
            let log = observed(&store);
            store.set_with_cost(k("a"), 1, usize::MAX);
            store.set_with_cost(k("b"), 2, 3);
            store.set_with_cost(k("c"), 3, usize::MAX - 1);

            assert_eq!(*log.lock(), vec![(k("a"), 1), (k("b"), 2)]);
            assert_eq!(store.total_cost(), usize::MAX - 1);
            store.debug_validate_invariants();
        }

        #[test]
        fn growing_an_existing_entry_evicts_others() {
            let store = BoundedMemoryStore::new("t", 0, 4);
            let log = observed(&store);
            store.set_with_cost(k("a"), 1, 2);
            store.set_with_cost(k("b"), 2, 2);
            store.set_with_cost(k("a"), 3, 3);
            assert_eq!(*log.lock(), vec![(k("b"), 2)]);
            assert_eq!(store.total_cost(), 3);
        }

        #[test]
        fn shrinking_limits_evicts_immediately() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            let log = observed(&store);
            for i in 0..4 {
                store.set(format!("k{i}"), i);
            }
            store.set_limits(2, 0);
            assert_eq!(*log.lock(), vec![(k("k0"), 0), (k("k1"), 1)]);
            assert_eq!(store.len(), 2);
        }
    }

    mod notification {
        use super::*;

        #[test]
        fn remove_fires_observer_by_default() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            let log = observed(&store);
            store.set(k("a"), 1);
            store.remove(&k("a"));
            assert_eq!(*log.lock(), vec![(k("a"), 1)]);
        }

        #[test]
        fn explicit_removal_is_silent() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            let log = observed(&store);
            store.set(k("a"), 1);
            store.set(k("b"), 2);
            store.remove_with(&k("a"), RemovalMode::ExplicitRemoval);
            store.clear_with(RemovalMode::ExplicitRemoval);
            assert!(log.lock().is_empty());
            assert!(store.is_empty());
        }

        #[test]
        fn clear_reports_each_entry_oldest_first() {
            let store = BoundedMemoryStore::new("t", 0, 0);
            let log = observed(&store);
            store.set(k("a"), 1);
            store.set(k("b"), 2);
            store.clear();
            assert_eq!(*log.lock(), vec![(k("a"), 1), (k("b"), 2)]);
        }

        #[test]
        fn cleared_observer_stops_receiving() {
            let store = BoundedMemoryStore::new("t", 1, 0);
            let log = observed(&store);
            store.clear_observer();
            store.set(k("a"), 1);
            store.set(k("b"), 2);
            assert!(log.lock().is_empty());
            assert_eq!(store.metrics().evictions, 1);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Set(u8, usize),
            Get(u8),
            Remove(u8),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..16, 0usize..6).prop_map(|(key, cost)| Op::Set(key, cost)),
                (0u8..16).prop_map(Op::Get),
                (0u8..16).prop_map(Op::Remove),
            ]
        }

        proptest! {
            #[test]
            fn limits_hold_after_every_operation(
                count_limit in 0usize..6,
                cost_limit in 0usize..12,
                ops in prop::collection::vec(op_strategy(), 1..120),
            ) {
                let store: BoundedMemoryStore<u8, u8> =
                    BoundedMemoryStore::new("prop", count_limit, cost_limit);
                let evicted = Arc::new(Mutex::new(0usize));
                let counter = Arc::clone(&evicted);
                store.set_observer(move |_: &u8, _: &Arc<u8>| *counter.lock() += 1);

                for op in ops {
                    match op {
                        Op::Set(key, cost) => {
                            store.set_with_cost(key, key, cost);
                            prop_assert!(store.contains(&key));
                            if store.len() > 1 {
                                if count_limit > 0 {
                                    prop_assert!(store.len() <= count_limit);
                                }
                                if cost_limit > 0 {
                                    prop_assert!(store.total_cost() <= cost_limit);
                                }
                            }
                        },
                        Op::Get(key) => {
                            if let Some(value) = store.get(&key) {
                                prop_assert_eq!(*value, key);
                            }
                        },
                        Op::Remove(key) => {
                            store.remove_with(&key, RemovalMode::ExplicitRemoval);
                            prop_assert!(!store.contains(&key));
                        },
                    }
                    store.debug_validate_invariants();
                }
                prop_assert_eq!(*evicted.lock() as u64, store.metrics().evictions);
            }
        }
    }
}
