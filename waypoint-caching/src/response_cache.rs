//! API response cache
//!
//! Stores JSON-serialized response bodies keyed by caller-supplied cache keys,
//! optionally gzip-compressed. Expired bodies remain readable through
//! [`ResponseCache::get_stale`] so callers can fall back to them when the
//! network path fails.

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use waypoint_core::{SharedClock, SystemClock};

use crate::{
    cache::Cache, config::CacheConfig, stores::PolicyCache, CacheError, CacheResult, CacheStats,
};

/// Encoded response body as held by the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    /// JSON bytes, gzip-compressed when `compressed` is set
    pub bytes: Vec<u8>,

    pub compressed: bool,

    /// Size of the uncompressed JSON
    pub original_size: usize,
}

impl CachedPayload {
    fn encode<T: Serialize>(value: &T, compress: bool) -> CacheResult<Self> {
        let json = serde_json::to_vec(value)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        let original_size = json.len();

        if !compress {
            return Ok(Self {
                bytes: json,
                compressed: false,
                original_size,
            });
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let bytes = encoder.finish()?;

        Ok(Self {
            bytes,
            compressed: true,
            original_size,
        })
    }

    fn decode<T: DeserializeOwned>(&self) -> CacheResult<T> {
        if !self.compressed {
            return serde_json::from_slice(&self.bytes)
                .map_err(|e| CacheError::DeserializationError(e.to_string()));
        }

        let mut json = Vec::with_capacity(self.original_size);
        GzDecoder::new(self.bytes.as_slice()).read_to_end(&mut json)?;
        serde_json::from_slice(&json).map_err(|e| CacheError::DeserializationError(e.to_string()))
    }

    /// Bytes actually held in memory
    pub fn stored_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Response cache shared between API clients
pub struct ResponseCache {
    inner: PolicyCache<String, Arc<CachedPayload>>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        let inner = PolicyCache::new(config.max_entries, config.eviction_policy)
            .with_default_ttl(config.default_ttl)
            .with_max_stale(config.max_stale)
            .with_clock(clock);

        Self { inner, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Fresh cached value for `key`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        if !self.config.enabled {
            return Ok(None);
        }
        match self.inner.get(&key.to_string()).await? {
            Some(payload) => payload.decode().map(Some),
            None => Ok(None),
        }
    }

    /// Cached value for `key` even if past its TTL
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        if !self.config.enabled {
            return Ok(None);
        }
        match self.inner.get_stale(&key.to_string()).await? {
            Some(payload) => payload.decode().map(Some),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        self.put_with_ttl(key, value, self.config.default_ttl).await
    }

    pub async fn put_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let payload = CachedPayload::encode(value, self.config.compression)?;
        if payload.stored_size() > self.config.max_entry_bytes {
            return Err(CacheError::CapacityExceeded(format!(
                "entry '{}' is {} bytes, limit is {}",
                key,
                payload.stored_size(),
                self.config.max_entry_bytes
            )));
        }

        log::trace!(
            "Caching '{}' ({} bytes, compressed: {})",
            key,
            payload.stored_size(),
            payload.compressed
        );
        self.inner
            .put_with_ttl(key.to_string(), Arc::new(payload), ttl)
            .await
    }

    pub async fn remove(&self, key: &str) -> CacheResult<bool> {
        Ok(self.inner.remove(&key.to_string()).await?.is_some())
    }

    pub async fn clear(&self) -> CacheResult<()> {
        self.inner.clear().await
    }

    pub async fn stats(&self) -> CacheResult<CacheStats> {
        self.inner.stats().await
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
