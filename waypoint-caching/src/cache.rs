//! Core cache traits and types

use async_trait::async_trait;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::{CacheResult, CacheStats};

/// Trait for types that can be used as cache keys
pub trait CacheKey: Clone + Eq + Hash + Debug + Send + Sync {}

/// Trait for types that can be cached
pub trait CacheValue: Clone + Debug + Send + Sync {}

// Blanket implementations
impl<T> CacheKey for T where T: Clone + Eq + Hash + Debug + Send + Sync {}
impl<T> CacheValue for T where T: Clone + Debug + Send + Sync {}

/// Core cache trait
#[async_trait]
pub trait Cache<K: CacheKey + 'static, V: CacheValue + 'static>: Send + Sync {
    /// Get a fresh value; expired entries read as `None`
    async fn get(&self, key: &K) -> CacheResult<Option<V>>;

    /// Get a value even if expired, as long as it is within the stale window
    async fn get_stale(&self, key: &K) -> CacheResult<Option<V>> {
        self.get(key).await
    }

    /// Put a value with the default TTL
    async fn put(&self, key: K, value: V) -> CacheResult<()>;

    /// Put a value with TTL
    async fn put_with_ttl(&self, key: K, value: V, _ttl: Duration) -> CacheResult<()> {
        self.put(key, value).await
    }

    /// Remove a value from the cache
    async fn remove(&self, key: &K) -> CacheResult<Option<V>>;

    /// Check if a fresh entry exists
    async fn contains_key(&self, key: &K) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Clear all entries
    async fn clear(&self) -> CacheResult<()>;

    /// Get the number of entries
    async fn len(&self) -> CacheResult<usize>;

    /// Check if cache is empty
    async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Get cache statistics
    async fn stats(&self) -> CacheResult<CacheStats>;
}

/// Cache entry with metadata
///
/// Instants come from the owning cache's clock so expiry can be tested
/// without sleeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Option<Instant>,
    pub access_count: u64,
    pub last_accessed: Instant,
}

impl<V: CacheValue> CacheEntry<V> {
    pub fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            created_at: now,
            expires_at: None,
            access_count: 0,
            last_accessed: now,
        }
    }

    pub fn with_ttl(value: V, ttl: Duration, now: Instant) -> Self {
        let mut entry = Self::new(value, now);
        entry.expires_at = now.checked_add(ttl);
        entry
    }

    /// Whether the entry is past its TTL
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    /// Whether the entry is too old even for stale reads
    pub fn is_dead(&self, now: Instant, max_stale: Duration) -> bool {
        match self.expires_at.and_then(|e| e.checked_add(max_stale)) {
            Some(stale_until) => now > stale_until,
            None => false,
        }
    }

    pub fn record_access(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_accessed = now;
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}
