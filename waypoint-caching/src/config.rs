//! Cache runtime configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::CacheError;

/// Which entry to drop when the cache is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used
    #[default]
    Lru,
    /// Least frequently used
    Lfu,
    /// Oldest insertion
    Fifo,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::Lru => write!(f, "lru"),
            EvictionPolicy::Lfu => write!(f, "lfu"),
            EvictionPolicy::Fifo => write!(f, "fifo"),
        }
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "fifo" => Ok(EvictionPolicy::Fifo),
            other => Err(CacheError::InvalidConfiguration(format!(
                "unknown eviction policy '{}'",
                other
            ))),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    #[serde(with = "waypoint_config::serde_duration")]
    pub default_ttl: Duration,
    /// How long past expiry an entry stays readable through `get_stale`
    #[serde(with = "waypoint_config::serde_duration")]
    pub max_stale: Duration,
    pub eviction_policy: EvictionPolicy,
    pub compression: bool,
    pub max_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from(&waypoint_config::CacheConfig::default())
    }
}

impl From<&waypoint_config::CacheConfig> for CacheConfig {
    fn from(config: &waypoint_config::CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_entries: config.max_entries.max(1),
            default_ttl: config.default_ttl,
            max_stale: config.max_stale,
            // Validation of the domain config rejects unknown names
            eviction_policy: config.eviction_policy.parse().unwrap_or_default(),
            compression: config.compression,
            max_entry_bytes: config.max_entry_bytes,
        }
    }
}
