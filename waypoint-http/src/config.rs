//! HTTP configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use waypoint_config::HttpConfig as ConfigHttpConfig;

/// API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL that relative endpoints are resolved against
    pub base_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,

    pub bearer_token: Option<String>,

    /// Attempts per request, including the first
    pub max_attempts: u32,

    /// Base of the `base * 2^attempt` backoff
    pub retry_base_delay: Duration,

    pub circuit_failure_threshold: u32,

    pub circuit_timeout: Duration,

    pub batch_endpoint: String,

    pub health_endpoint: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::from(ConfigHttpConfig::default())
    }
}

impl From<ConfigHttpConfig> for HttpConfig {
    fn from(config: ConfigHttpConfig) -> Self {
        Self {
            base_url: config.base_url,
            timeout: config.timeout,
            user_agent: config.user_agent,
            verify_ssl: config.verify_ssl,
            bearer_token: config.bearer_token,
            max_attempts: config.max_attempts.max(1),
            retry_base_delay: config.retry_base_delay_ms,
            circuit_failure_threshold: config.circuit_failure_threshold,
            circuit_timeout: config.circuit_timeout,
            batch_endpoint: config.batch_endpoint,
            health_endpoint: config.health_endpoint,
        }
    }
}

impl HttpConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Absolute URL for `endpoint`; absolute endpoints pass through untouched
    pub fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let config = HttpConfig::default().with_base_url("http://localhost:3000/");
        assert_eq!(
            config.resolve("/api/v1/subjects"),
            "http://localhost:3000/api/v1/subjects"
        );
        assert_eq!(
            config.resolve("api/health"),
            "http://localhost:3000/api/health"
        );
        assert_eq!(
            config.resolve("https://status.example.com/ping"),
            "https://status.example.com/ping"
        );
    }

    #[test]
    fn test_defaults_follow_domain_config() {
        let config = HttpConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.circuit_failure_threshold, 5);
        assert_eq!(config.health_endpoint, "/api/health");
    }
}
