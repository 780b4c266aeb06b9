//! Configuration loading and environment variable handling

use crate::domains::WaypointConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the `WAYPOINT` prefix
    pub fn new() -> Self {
        Self {
            prefix: "WAYPOINT".to_string(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<WaypointConfig> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config: WaypointConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<WaypointConfig> {
        let mut config = WaypointConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load from the given file when present, otherwise from the environment
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<WaypointConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut WaypointConfig) -> ConfigResult<()> {
        self.apply_http_overrides(&mut config.http)?;
        self.apply_cache_overrides(&mut config.cache)?;
        self.apply_resilience_overrides(&mut config.resilience)?;
        self.apply_batch_overrides(&mut config.batch)?;
        self.apply_logging_overrides(&mut config.logging)?;

        if let Ok(ws_url) = self.get_env_var("SYNC_WS_URL") {
            config.sync.get_or_insert_with(Default::default).ws_url = ws_url;
        }

        Ok(())
    }

    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(base_url) = self.get_env_var("HTTP_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            config.timeout = Duration::from_secs(self.parse_var("HTTP_TIMEOUT", &timeout)?);
        }

        if let Ok(token) = self.get_env_var("HTTP_BEARER_TOKEN") {
            config.bearer_token = Some(token);
        }

        if let Ok(verify_ssl) = self.get_env_var("HTTP_VERIFY_SSL") {
            config.verify_ssl = self.parse_var("HTTP_VERIFY_SSL", &verify_ssl)?;
        }

        Ok(())
    }

    fn apply_cache_overrides(
        &self,
        config: &mut crate::domains::cache::CacheConfig,
    ) -> ConfigResult<()> {
        if let Ok(enabled) = self.get_env_var("CACHE_ENABLED") {
            config.enabled = self.parse_var("CACHE_ENABLED", &enabled)?;
        }

        if let Ok(max_entries) = self.get_env_var("CACHE_MAX_ENTRIES") {
            config.max_entries = self.parse_var("CACHE_MAX_ENTRIES", &max_entries)?;
        }

        Ok(())
    }

    fn apply_resilience_overrides(
        &self,
        config: &mut crate::domains::resilience::ResilienceConfig,
    ) -> ConfigResult<()> {
        if let Ok(max_retries) = self.get_env_var("MAX_RETRIES") {
            config.max_retries = self.parse_var("MAX_RETRIES", &max_retries)?;
        }

        if let Ok(threshold) = self.get_env_var("CIRCUIT_BREAKER_THRESHOLD") {
            config.circuit_breaker_threshold =
                self.parse_var("CIRCUIT_BREAKER_THRESHOLD", &threshold)?;
        }

        Ok(())
    }

    fn apply_batch_overrides(
        &self,
        config: &mut crate::domains::batch::BatchConfig,
    ) -> ConfigResult<()> {
        if let Ok(size) = self.get_env_var("BATCH_MAX_SIZE") {
            config.max_batch_size = self.parse_var("BATCH_MAX_SIZE", &size)?;
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn parse_var<T>(&self, name: &str, raw: &str) -> ConfigResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        raw.trim()
            .parse()
            .map_err(|e| ConfigError::EnvError(format!("Invalid {}_{}: {}", self.prefix, name, e)))
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
