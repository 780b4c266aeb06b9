//! Caching for Waypoint
//!
//! A bounded in-memory store with LRU, LFU or FIFO eviction, TTL expiry and a
//! stale-read window, plus a response cache that serializes (and optionally
//! compresses) API payloads on top of it.

pub mod cache;
pub mod config;
pub mod errors;
pub mod response_cache;
pub mod stats;
pub mod stores;

pub use cache::{Cache, CacheEntry, CacheKey, CacheValue};
pub use config::{CacheConfig, EvictionPolicy};
pub use errors::{CacheError, CacheResult};
pub use response_cache::{CachedPayload, ResponseCache};
pub use stats::CacheStats;
pub use stores::PolicyCache;
