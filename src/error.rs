//! Error types for the tiered cache.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by disk-tier operations that report failure
//!   (`delete`, `delete_all`, `enforce_count_limit`) and by construction.
//! - [`ConfigError`]: Returned when a memory or disk policy is invalid
//!   (empty folder name, zero queue capacity).
//! - [`CodecError`]: Returned by value codecs. Front ends treat it as a miss
//!   and never surface it to callers.
//!
//! The memory tier has no error type: it cannot fail.
//!
//! ## Example Usage
//!
//! ```
//! use tiercache::config::DiskPolicy;
//! use tiercache::error::ConfigError;
//!
//! let bad = DiskPolicy::new("../escape");
//! let err: ConfigError = bad.validate().unwrap_err();
//! assert!(err.to_string().contains("folder"));
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CacheError {
    /// A policy failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// No platform cache directory could be resolved.
    #[error("cache root directory could not be resolved")]
    RootUnavailable,

    /// A filesystem operation failed.
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `delete` targeted a key that has no file.
    #[error("no cached file for key {key:?}")]
    NotFound { key: String },

    /// The key cannot be mapped to a filename.
    #[error("key cannot be used as a cache filename")]
    InvalidKey,

    /// The disk worker has stopped and no longer accepts requests.
    #[error("disk store is shut down")]
    Closed,
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Carries a human-readable description of which parameter failed
/// validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
