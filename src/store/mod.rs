//! Storage tiers: a bounded in-memory LRU and a serialized on-disk store.

pub mod disk;
pub mod memory;
pub mod traits;
