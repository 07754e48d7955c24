//! Platform cache-root resolution.
//!
//! Defers to [`dirs::cache_dir`]: `$XDG_CACHE_HOME` or `$HOME/.cache` on
//! Linux, `$HOME/Library/Caches` on macOS, `{FOLDERID_LocalAppData}` on
//! Windows. `DiskPolicy::root` overrides it.

use std::path::PathBuf;

use crate::error::{CacheError, Result};

/// Resolves the directory under which cache folders are created.
pub fn platform_cache_root() -> Result<PathBuf> {
    dirs::cache_dir().ok_or(CacheError::RootUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_root_is_absolute() {
        if let Ok(root) = platform_cache_root() {
            assert!(root.is_absolute());
        }
    }
}
