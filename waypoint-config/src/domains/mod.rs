//! Domain-specific configuration modules

pub mod batch;
pub mod cache;
pub mod http;
pub mod load_test;
pub mod logging;
pub mod resilience;
pub mod sync;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Waypoint configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WaypointConfig {
    /// API client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: cache::CacheConfig,

    /// Retry, circuit breaker and error reporting configuration
    #[serde(default)]
    pub resilience: resilience::ResilienceConfig,

    /// Batch coordinator configuration
    #[serde(default)]
    pub batch: batch::BatchConfig,

    /// Load and stress test defaults
    #[serde(default)]
    pub load_test: load_test::LoadTestConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Realtime sync configuration (optional, only for sync clients)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<sync::SyncConfig>,
}

impl WaypointConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.http.validate()?;
        self.cache.validate()?;
        self.resilience.validate()?;
        self.batch.validate()?;
        self.load_test.validate()?;
        self.logging.validate()?;

        if let Some(ref sync) = self.sync {
            sync.validate()?;
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = WaypointConfig {
            sync: Some(sync::SyncConfig::default()),
            ..Default::default()
        };
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
