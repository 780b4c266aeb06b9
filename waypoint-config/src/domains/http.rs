//! API client configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URL that relative endpoints are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_timeout"
    )]
    pub timeout: Duration,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether to verify SSL certificates
    #[serde(default = "crate::domains::utils::default_true")]
    pub verify_ssl: bool,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the `base * 2^attempt` backoff between attempts
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_retry_base_delay"
    )]
    pub retry_base_delay_ms: Duration,

    /// Failed requests before the client-wide circuit opens
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,

    /// How long the client-wide circuit stays open
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_circuit_timeout"
    )]
    pub circuit_timeout: Duration,

    /// Endpoint accepting coalesced multi-URL GET requests
    #[serde(default = "default_batch_endpoint")]
    pub batch_endpoint: String,

    /// Health check endpoint
    #[serde(default = "default_health_endpoint")]
    pub health_endpoint: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            verify_ssl: true,
            bearer_token: None,
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_timeout: default_circuit_timeout(),
            batch_endpoint: default_batch_endpoint(),
            health_endpoint: default_health_endpoint(),
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;
        validate_positive(self.max_attempts, "max_attempts", self.domain_name())?;
        validate_positive(
            self.circuit_failure_threshold,
            "circuit_failure_threshold",
            self.domain_name(),
        )?;
        validate_required_string(&self.batch_endpoint, "batch_endpoint", self.domain_name())?;

        if let Some(ref token) = self.bearer_token {
            if token.trim().is_empty() {
                return Err(self.validation_error("bearer_token cannot be blank when set"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    "Waypoint/0.2".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_circuit_failure_threshold() -> u32 {
    5
}

fn default_circuit_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_batch_endpoint() -> String {
    "/api/v1/batch".to_string()
}

fn default_health_endpoint() -> String {
    "/api/health".to_string()
}
