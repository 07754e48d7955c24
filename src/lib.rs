//! tiercache: a two-tier memory + disk cache with eviction-triggered write-back.
//!
//! Values live in a bounded in-memory LRU ([`store::memory`]). When capacity
//! pressure evicts one, it is encoded and written to a per-cache directory
//! ([`store::disk`]) by a single background worker. Reads check memory, then
//! disk, and promote disk hits back into memory. Explicit deletes remove from
//! both tiers and are never written back.
//!
//! Start from [`builder::CacheBuilder`] or one of the typed front ends in
//! [`frontend`].

pub mod builder;
pub mod codec;
pub mod config;
pub mod ds;
pub mod error;
pub mod frontend;
pub mod prelude;
pub mod store;
pub mod tiered;
