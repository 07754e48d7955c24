//! Builder for tiered caches and their typed front ends.
//!
//! Collects a [`CachePolicy`] through chained setters and opens the cache in
//! one fallible step. Caches are plain values: build one per folder and pass
//! it to whoever needs it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiercache::builder::CacheBuilder;
//!
//! # async fn demo() -> tiercache::error::Result<()> {
//! let cache = CacheBuilder::new("Thumbnails")
//!     .memory_count_limit(256)
//!     .disk_count_limit(4096)
//!     .build_data()?;
//!
//! cache.save(vec![0xFF; 32], "avatar-42");
//! assert!(cache.get("avatar-42").await.is_some());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use crate::codec::{MediaCodec, PngCodec, ValueCodec};
use crate::config::CachePolicy;
use crate::error::Result;
#[cfg(feature = "json")]
use crate::frontend::ObjectCache;
use crate::frontend::{DataCache, MediaCache};
use crate::tiered::TieredCache;

/// Builder for creating cache instances.
#[derive(Debug, Clone, Default)]
pub struct CacheBuilder {
    policy: CachePolicy,
}

impl CacheBuilder {
    /// Starts from [`CachePolicy::named`]: folder `name`, no limits.
    pub fn new(name: &str) -> Self {
        Self {
            policy: CachePolicy::named(name),
        }
    }

    /// Starts from an existing policy, e.g. one deserialized from config.
    pub fn from_policy(policy: CachePolicy) -> Self {
        Self { policy }
    }

    pub fn memory_count_limit(mut self, limit: usize) -> Self {
        self.policy.memory.count_limit = limit;
        self
    }

    pub fn memory_cost_limit(mut self, limit: usize) -> Self {
        self.policy.memory.total_cost_limit = limit;
        self
    }

    pub fn disk_count_limit(mut self, limit: usize) -> Self {
        self.policy.disk.count_limit = limit;
        self
    }

    /// Parent directory of the cache folder; defaults to the platform cache root.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.policy.disk.root = Some(root.into());
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.policy.disk.queue_capacity = capacity;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Opens a cache for any value type with the given codec.
    pub fn build<V, C>(self, codec: C) -> Result<TieredCache<V, C>>
    where
        V: Send + Sync + 'static,
        C: ValueCodec<V>,
    {
        TieredCache::open(&self.policy, codec)
    }

    pub fn build_data(self) -> Result<DataCache> {
        DataCache::open(&self.policy)
    }

    #[cfg(feature = "json")]
    pub fn build_objects<T>(self) -> Result<ObjectCache<T>>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        ObjectCache::open(&self.policy)
    }

    pub fn build_media(self) -> Result<MediaCache<PngCodec>> {
        MediaCache::open(&self.policy)
    }

    pub fn build_media_with<M: MediaCodec>(self, codec: M) -> Result<MediaCache<M>> {
        MediaCache::with_codec(&self.policy, codec)
    }
}
