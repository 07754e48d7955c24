pub use crate::builder::CacheBuilder;
pub use crate::codec::{BytesCodec, DecodedImage, Media, MediaCodec, PngCodec, ValueCodec};
#[cfg(feature = "json")]
pub use crate::codec::JsonCodec;
pub use crate::config::{CachePolicy, DiskPolicy, MemoryPolicy};
pub use crate::error::{CacheError, CodecError, ConfigError, Result};
#[cfg(feature = "json")]
pub use crate::frontend::ObjectCache;
pub use crate::frontend::{DataCache, MediaCache};
pub use crate::store::disk::DiskStore;
pub use crate::store::memory::BoundedMemoryStore;
pub use crate::store::traits::{DiskMetrics, EvictionObserver, RemovalMode, StoreMetrics};
pub use crate::tiered::TieredCache;
