//! Typed front ends over [`TieredCache`].
//!
//! Each front end fixes a value type and a codec, and speaks in
//! `save` / `get` / `delete` / `delete_all`.
//!
//! | Front end        | Value             | Codec            | Memory cost        |
//! |------------------|-------------------|------------------|--------------------|
//! | [`DataCache`]    | `Vec<u8>`         | [`BytesCodec`]   | 1 per entry        |
//! | [`ObjectCache`]  | `T: Serialize`    | `JsonCodec<T>`   | 1 per entry        |
//! | [`MediaCache`]   | [`DecodedImage`]  | [`Media<M>`]     | decoded byte size  |
//!
//! Each front end owns its own stores; nothing here is global.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "json")]
use crate::codec::JsonCodec;
use crate::codec::{BytesCodec, DecodedImage, Media, MediaCodec, PngCodec};
use crate::config::CachePolicy;
use crate::error::Result;
use crate::tiered::TieredCache;

/// Read and removal operations shared by every front end.
macro_rules! delegate_to_tiered {
    ($value:ty, $codec:ty) => {
        /// Memory first, then disk; disk hits are promoted into memory.
        pub async fn get(&self, key: &str) -> Option<Arc<$value>> {
            self.inner.get(key).await
        }

        /// Blocking `get`. Must not be called from inside an async runtime.
        pub fn get_blocking(&self, key: &str) -> Option<Arc<$value>> {
            self.inner.get_blocking(key)
        }

        /// Callback `get`; a disk read completes on the disk worker thread.
        pub fn get_with<F>(&self, key: &str, callback: F)
        where
            F: FnOnce(Option<Arc<$value>>) + Send + 'static,
        {
            self.inner.get_with(key, callback)
        }

        /// Removes `key` from both tiers without writing it back.
        pub async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }

        /// Empties both tiers.
        pub async fn delete_all(&self) -> Result<()> {
            self.inner.clear().await
        }

        /// The underlying two-tier cache.
        pub fn tiered(&self) -> &TieredCache<$value, $codec> {
            &self.inner
        }
    };
}

// ---------------------------------------------------------------------------
// DataCache
// ---------------------------------------------------------------------------

/// Raw byte blobs.
#[derive(Debug, Clone)]
pub struct DataCache {
    inner: TieredCache<Vec<u8>, BytesCodec>,
}

impl DataCache {
    pub fn open(policy: &CachePolicy) -> Result<Self> {
        Ok(Self {
            inner: TieredCache::open(policy, BytesCodec)?,
        })
    }

    /// Opens the default `"DataCache"` folder under the platform cache root.
    pub fn open_default() -> Result<Self> {
        Self::open(&CachePolicy::for_data())
    }

    pub fn save(&self, value: Vec<u8>, key: impl Into<String>) {
        self.inner.put(key, value);
    }

    pub fn save_with_cost(&self, value: Vec<u8>, key: impl Into<String>, cost: usize) {
        self.inner.put_with_cost(key, value, cost);
    }

    delegate_to_tiered!(Vec<u8>, BytesCodec);
}

// ---------------------------------------------------------------------------
// ObjectCache
// ---------------------------------------------------------------------------

/// Structured objects persisted as JSON.
#[cfg(feature = "json")]
pub struct ObjectCache<T> {
    inner: TieredCache<T, JsonCodec<T>>,
}

#[cfg(feature = "json")]
impl<T> ObjectCache<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    pub fn open(policy: &CachePolicy) -> Result<Self> {
        Ok(Self {
            inner: TieredCache::open(policy, JsonCodec::new())?,
        })
    }

    /// Opens the default `"ObjectCache"` folder under the platform cache root.
    pub fn open_default() -> Result<Self> {
        Self::open(&CachePolicy::for_objects())
    }

    pub fn save(&self, value: T, key: impl Into<String>) {
        self.inner.put(key, value);
    }

    pub fn save_with_cost(&self, value: T, key: impl Into<String>, cost: usize) {
        self.inner.put_with_cost(key, value, cost);
    }

    delegate_to_tiered!(T, JsonCodec<T>);
}

#[cfg(feature = "json")]
impl<T> Clone for ObjectCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(feature = "json")]
impl<T> fmt::Debug for ObjectCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCache")
            .field("inner", &self.inner)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MediaCache
// ---------------------------------------------------------------------------

/// Decoded images. Memory cost is the decoded pixel size, for saves and for
/// disk hits promoted back into memory, so `total_cost_limit` bounds memory
/// in bytes.
pub struct MediaCache<M = PngCodec> {
    inner: TieredCache<DecodedImage, Media<M>>,
}

impl MediaCache<PngCodec> {
    pub fn open(policy: &CachePolicy) -> Result<Self> {
        Self::with_codec(policy, PngCodec)
    }

    /// Opens the default `"MediaCache"` folder under the platform cache root.
    pub fn open_default() -> Result<Self> {
        Self::open(&CachePolicy::for_media())
    }
}

impl<M: MediaCodec> MediaCache<M> {
    pub fn with_codec(policy: &CachePolicy, codec: M) -> Result<Self> {
        let inner =
            TieredCache::open(policy, Media(codec))?.with_promotion_cost(DecodedImage::byte_len);
        Ok(Self { inner })
    }

    pub fn save(&self, image: DecodedImage, key: impl Into<String>) {
        let cost = image.byte_len();
        self.inner.put_with_cost(key, image, cost);
    }

    pub fn save_with_cost(&self, image: DecodedImage, key: impl Into<String>, cost: usize) {
        self.inner.put_with_cost(key, image, cost);
    }

    delegate_to_tiered!(DecodedImage, Media<M>);
}

impl<M> Clone for MediaCache<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M> fmt::Debug for MediaCache<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCache")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn policy(dir: &TempDir, name: &str, count_limit: usize) -> CachePolicy {
        let mut policy = CachePolicy::named(name).with_root(dir.path());
        policy.memory.count_limit = count_limit;
        policy
    }

    #[tokio::test]
    async fn data_cache_save_get_delete() {
        let dir = TempDir::new().unwrap();
        let cache = DataCache::open(&policy(&dir, "data", 0)).unwrap();
        cache.save(b"payload".to_vec(), "blob");
        assert_eq!(cache.get("blob").await.as_deref(), Some(&b"payload".to_vec()));
        cache.delete("blob").await.unwrap();
        assert!(cache.get("blob").await.is_none());
    }

    #[cfg(feature = "json")]
    #[tokio::test]
    async fn object_cache_survives_eviction() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Profile {
            id: u32,
            name: String,
        }

        let dir = TempDir::new().unwrap();
        let cache = ObjectCache::<Profile>::open(&policy(&dir, "objects", 1)).unwrap();
        cache.save(Profile { id: 1, name: "ada".into() }, "p1");
        cache.save(Profile { id: 2, name: "bob".into() }, "p2");
        cache.tiered().flush().await.unwrap();

        assert!(cache.tiered().peek_memory("p1").is_none());
        let restored = cache.get("p1").await.unwrap();
        assert_eq!(*restored, Profile { id: 1, name: "ada".into() });
    }

    #[tokio::test]
    async fn media_cache_costs_by_pixel_bytes() {
        let dir = TempDir::new().unwrap();
        let mut policy = policy(&dir, "media", 0);
        policy.memory.total_cost_limit = 64;
        let cache = MediaCache::open(&policy).unwrap();

        let small = DecodedImage::new(2, 2, vec![7; 16]).unwrap();
        let large = DecodedImage::new(4, 3, vec![9; 48]).unwrap();
        cache.save(small.clone(), "small");
        assert_eq!(cache.tiered().memory().total_cost(), 16);
        cache.save(large, "large");
        assert_eq!(cache.tiered().memory().total_cost(), 64);

        cache.save(DecodedImage::new(1, 1, vec![0; 4]).unwrap(), "dot");
        cache.tiered().flush().await.unwrap();
        assert!(cache.tiered().peek_memory("small").is_none());
        assert_eq!(cache.get("small").await.as_deref(), Some(&small));

        // Promotion charges 16 bytes again, which pushes "large" out.
        assert_eq!(cache.tiered().memory().total_cost(), 20);
        assert!(cache.tiered().peek_memory("large").is_none());
    }

    #[tokio::test]
    async fn delete_all_empties_both_tiers() {
        let dir = TempDir::new().unwrap();
        let cache = DataCache::open(&policy(&dir, "wipe", 1)).unwrap();
        cache.save(vec![1], "a");
        cache.save(vec![2], "b");
        cache.tiered().flush().await.unwrap();
        cache.delete_all().await.unwrap();
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_none());
    }
}
