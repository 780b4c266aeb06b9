//! Response cache configuration

use crate::error::ConfigResult;
use crate::validation::{validate_enum_choice, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether response caching is enabled
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Maximum number of cached responses
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// TTL for fresh entries
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_ttl"
    )]
    pub default_ttl: Duration,

    /// How long past expiry an entry may still be served as a fallback
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_max_stale"
    )]
    pub max_stale: Duration,

    /// Eviction policy: lru, lfu or fifo
    #[serde(default = "default_eviction_policy")]
    pub eviction_policy: String,

    /// Compress cached payloads
    #[serde(default = "crate::domains::utils::default_false")]
    pub compression: bool,

    /// Largest payload that will be cached, in bytes
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            default_ttl: default_ttl(),
            max_stale: default_max_stale(),
            eviction_policy: default_eviction_policy(),
            compression: false,
            max_entry_bytes: default_max_entry_bytes(),
        }
    }
}

impl Validatable for CacheConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_entries, "max_entries", self.domain_name())?;
        validate_positive(self.default_ttl.as_secs(), "default_ttl", self.domain_name())?;
        validate_enum_choice(
            &self.eviction_policy,
            &["lru", "lfu", "fifo"],
            "eviction_policy",
            self.domain_name(),
        )?;
        validate_positive(self.max_entry_bytes, "max_entry_bytes", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cache"
    }
}

fn default_max_entries() -> usize {
    500
}

fn default_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_max_stale() -> Duration {
    Duration::from_secs(3600)
}

fn default_eviction_policy() -> String {
    "lru".to_string()
}

fn default_max_entry_bytes() -> usize {
    1024 * 1024
}
