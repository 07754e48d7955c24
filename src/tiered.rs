//! # Tiered Cache
//!
//! Stitches a [`BoundedMemoryStore`] and a [`DiskStore`] into a read-through,
//! write-back cache.
//!
//! ## Data flow
//!
//! ```text
//!   put(k, v) ──────────────► memory ──(capacity eviction)──► observer
//!                                                               │ try_send
//!                                                               ▼
//!   get(k) ──► memory hit? ── yes ──► v                  disk worker queue
//!                  │ no                                         │ encode + save
//!                  ▼                                            ▼
//!             disk.load(k) ──► decode ──► promote to memory ──► v
//!
//!   delete(k) ──► memory.remove_with(k, ExplicitRemoval) ──► disk.delete(k)
//!   clear()   ──► memory.clear_with(ExplicitRemoval)     ──► disk.delete_all()
//! ```
//!
//! ## Write-back
//!
//! The observer is installed once, at construction. For every automatic
//! eviction it queues a write-back on the disk worker and returns; the
//! `put` that caused the eviction never waits for the write. Encoding runs on
//! the worker thread, and an encoding failure drops the write-back.
//! [`TieredCache::pending_write_backs`] and [`TieredCache::flush`] make the
//! queue observable; [`TieredCache::shutdown`] drains it.
//!
//! ## Explicit removal
//!
//! `delete` and `clear` remove from memory with
//! [`RemovalMode::ExplicitRemoval`], so nothing they remove is written back.
//! The mode is an argument of the removal itself, not shared state, so a
//! concurrent `put` that evicts an unrelated key is still written back.
//!
//! Because the observer runs under the memory lock and the disk worker is
//! FIFO, a write-back for key `k` queued by a concurrent eviction is always
//! ahead of the disk delete issued by `delete(k)`. Once `delete(k)` returns,
//! `k` is on neither tier unless another caller wrote `k` again meanwhile.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::ValueCodec;
use crate::config::{CachePolicy, MemoryPolicy};
use crate::error::{CacheError, Result};
use crate::store::disk::DiskStore;
use crate::store::memory::{BoundedMemoryStore, DEFAULT_COST};
use crate::store::traits::RemovalMode;

/// Two-tier cache keyed by `String`, with values of type `V` persisted
/// through codec `C`.
pub struct TieredCache<V, C> {
    memory: Arc<BoundedMemoryStore<String, V>>,
    disk: DiskStore,
    codec: Arc<C>,
    promotion_cost: fn(&V) -> usize,
}

impl<V, C> Clone for TieredCache<V, C> {
    fn clone(&self) -> Self {
        Self {
            memory: Arc::clone(&self.memory),
            disk: self.disk.clone(),
            codec: Arc::clone(&self.codec),
            promotion_cost: self.promotion_cost,
        }
    }
}

fn default_cost<V>(_: &V) -> usize {
    DEFAULT_COST
}

impl<V, C> TieredCache<V, C>
where
    V: Send + Sync + 'static,
    C: ValueCodec<V>,
{
    /// Opens the disk tier described by `policy` and builds the cache.
    pub fn open(policy: &CachePolicy, codec: C) -> Result<Self> {
        policy.validate()?;
        let disk = DiskStore::open(&policy.disk)?;
        Ok(Self::with_stores(memory_store(&policy.memory), disk, codec))
    }

    /// Builds a cache over existing stores and installs the write-back
    /// observer, replacing any observer `memory` already had.
    pub fn with_stores(memory: BoundedMemoryStore<String, V>, disk: DiskStore, codec: C) -> Self {
        let memory = Arc::new(memory);
        let codec = Arc::new(codec);

        let writer = disk.clone();
        let encoder = Arc::clone(&codec);
        memory.set_observer(move |key: &String, value: &Arc<V>| {
            let codec = Arc::clone(&encoder);
            let value = Arc::clone(value);
            let name = key.clone();
            debug!(key = %key, "queueing write-back");
            writer.submit_write_back(key.clone(), move || match codec.encode(&value) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!(key = %name, error = %err, "write-back encode failed");
                    None
                },
            });
        });

        Self {
            memory,
            disk,
            codec,
            promotion_cost: default_cost::<V>,
        }
    }

    /// Cost given to values promoted from disk. Defaults to
    /// [`DEFAULT_COST`].
    pub fn with_promotion_cost(mut self, cost: fn(&V) -> usize) -> Self {
        self.promotion_cost = cost;
        self
    }

    /// Stores `value` in memory only; disk is untouched until eviction.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.memory.set(key.into(), value);
    }

    pub fn put_with_cost(&self, key: impl Into<String>, value: V, cost: usize) {
        self.memory.set_with_cost(key.into(), value, cost);
    }

    /// Memory first, then disk. A disk hit is decoded and promoted back into
    /// memory with the promotion cost. Decode failures count as a miss.
    pub async fn get(&self, key: &str) -> Option<Arc<V>> {
        if let Some(value) = self.memory.get(&key.to_string()) {
            return Some(value);
        }
        let bytes = self.disk.load(key).await?;
        self.promote(key, &bytes)
    }

    /// Blocking [`Self::get`]. Must not be called from inside an async runtime.
    pub fn get_blocking(&self, key: &str) -> Option<Arc<V>> {
        if let Some(value) = self.memory.get(&key.to_string()) {
            return Some(value);
        }
        let bytes = self.disk.load_blocking(key)?;
        self.promote(key, &bytes)
    }

    /// Callback [`Self::get`]. A memory hit calls `callback` before returning;
    /// otherwise it runs on the disk worker thread once the load finishes.
    pub fn get_with<F>(&self, key: &str, callback: F)
    where
        F: FnOnce(Option<Arc<V>>) + Send + 'static,
    {
        if let Some(value) = self.memory.get(&key.to_string()) {
            callback(Some(value));
            return;
        }
        let this = self.clone();
        let owned_key = key.to_string();
        self.disk.load_with(key, move |bytes| {
            callback(bytes.and_then(|bytes| this.promote(&owned_key, &bytes)));
        });
    }

    /// Memory value for `key` without touching disk or recency.
    pub fn peek_memory(&self, key: &str) -> Option<Arc<V>> {
        self.memory.peek(&key.to_string())
    }

    /// `true` if either tier holds `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.memory.contains(&key.to_string()) || self.disk.contains_key(key).await
    }

    /// Removes `key` from both tiers without writing it back.
    ///
    /// Returns [`CacheError::NotFound`] only when neither tier held the key.
    /// A key with no filename (`""`) can only live in memory, so removing it
    /// from there counts as success; other disk failures are returned as is.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let in_memory = self
            .memory
            .remove_with(&key.to_string(), RemovalMode::ExplicitRemoval)
            .is_some();
        match self.disk.delete(key).await {
            Err(CacheError::NotFound { .. } | CacheError::InvalidKey) if in_memory => Ok(()),
            other => other,
        }
    }

    /// Empties both tiers without writing anything back.
    pub async fn clear(&self) -> Result<()> {
        self.memory.clear_with(RemovalMode::ExplicitRemoval);
        self.disk.delete_all().await
    }

    pub fn pending_write_backs(&self) -> usize {
        self.disk.pending_write_backs()
    }

    /// Waits for every write-back queued so far.
    pub async fn flush(&self) -> Result<()> {
        self.disk.flush().await
    }

    /// Drains queued write-backs and stops the disk worker.
    pub async fn shutdown(&self) {
        self.disk.shutdown().await;
    }

    pub fn memory(&self) -> &BoundedMemoryStore<String, V> {
        &self.memory
    }

    pub fn disk(&self) -> &DiskStore {
        &self.disk
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn promote(&self, key: &str, bytes: &[u8]) -> Option<Arc<V>> {
        match self.codec.decode(bytes) {
            Ok(value) => {
                let value = Arc::new(value);
                let cost = (self.promotion_cost)(&value);
                self.memory
                    .set_arc(key.to_string(), Arc::clone(&value), cost);
                debug!(key = %key, cost, "promoted disk hit into memory");
                Some(value)
            },
            Err(err) => {
                warn!(key = %key, error = %err, "cached bytes failed to decode");
                None
            },
        }
    }
}

pub(crate) fn memory_store<V>(policy: &MemoryPolicy) -> BoundedMemoryStore<String, V> {
    BoundedMemoryStore::new(
        policy.name.clone(),
        policy.count_limit,
        policy.total_cost_limit,
    )
}

impl<V, C> fmt::Debug for TieredCache<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("memory", &self.memory)
            .field("disk", &self.disk)
            .finish_non_exhaustive()
    }
}
