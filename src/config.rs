//! Cache policies.
//!
//! Plain data with defaults, loadable from any serde format. Policies are
//! validated when a cache is built.
//!
//! | Policy         | Field               | Default              |
//! |----------------|---------------------|----------------------|
//! | `MemoryPolicy` | `name`              | `"tiercache.memory"` |
//! |                | `count_limit`       | `0` (unbounded)      |
//! |                | `total_cost_limit`  | `0` (unbounded)      |
//! | `DiskPolicy`   | `cache_folder_name` | `"tiercache"`        |
//! |                | `count_limit`       | `0` (unbounded)      |
//! |                | `root`              | platform cache root  |
//! |                | `queue_capacity`    | `1024`               |
//!
//! Two disk stores must never share a folder: they would race on the same
//! files with no coordination.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::store::disk::root::platform_cache_root;

pub const DEFAULT_FOLDER_NAME: &str = "tiercache";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryPolicy {
    /// Debug label, shows up in logs.
    pub name: String,
    pub count_limit: usize,
    pub total_cost_limit: usize,
}

impl MemoryPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_count_limit(mut self, count_limit: usize) -> Self {
        self.count_limit = count_limit;
        self
    }

    pub fn with_total_cost_limit(mut self, total_cost_limit: usize) -> Self {
        self.total_cost_limit = total_cost_limit;
        self
    }
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            name: format!("{DEFAULT_FOLDER_NAME}.memory"),
            count_limit: 0,
            total_cost_limit: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskPolicy {
    pub cache_folder_name: String,
    /// Maximum retained files; `0` keeps everything.
    pub count_limit: usize,
    /// Parent directory of the cache folder. `None` uses the platform cache root.
    pub root: Option<PathBuf>,
    /// Maximum queued disk requests, write-backs included.
    pub queue_capacity: usize,
}

impl DiskPolicy {
    pub fn new(cache_folder_name: impl Into<String>) -> Self {
        Self {
            cache_folder_name: cache_folder_name.into(),
            ..Self::default()
        }
    }

    pub fn with_count_limit(mut self, count_limit: usize) -> Self {
        self.count_limit = count_limit;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.cache_folder_name.as_str();
        if name.is_empty() || name == "." || name == ".." {
            return Err(ConfigError::new(format!(
                "cache folder name {name:?} is not a usable directory name"
            )));
        }
        if name.contains(['/', '\\']) {
            return Err(ConfigError::new(format!(
                "cache folder name {name:?} must not contain path separators"
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::new("queue_capacity must be > 0"));
        }
        Ok(())
    }

    /// `<root>/<cache_folder_name>`, resolving the platform root if unset.
    pub fn directory(&self) -> Result<PathBuf> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => platform_cache_root()?,
        };
        Ok(root.join(&self.cache_folder_name))
    }
}

impl Default for DiskPolicy {
    fn default() -> Self {
        Self {
            cache_folder_name: DEFAULT_FOLDER_NAME.to_string(),
            count_limit: 0,
            root: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// One memory policy plus one disk policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    pub memory: MemoryPolicy,
    pub disk: DiskPolicy,
}

impl CachePolicy {
    /// Folder `name`, memory label `"{name}.memory"`.
    pub fn named(name: &str) -> Self {
        Self {
            memory: MemoryPolicy::new(format!("{name}.memory")),
            disk: DiskPolicy::new(name),
        }
    }

    pub fn for_data() -> Self {
        Self::named("DataCache")
    }

    pub fn for_objects() -> Self {
        Self::named("ObjectCache")
    }

    pub fn for_media() -> Self {
        Self::named("MediaCache")
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.disk.root = Some(root.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.disk.validate()
    }
}
