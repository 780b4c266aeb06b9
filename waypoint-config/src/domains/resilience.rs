//! Retry, circuit breaker and error reporting configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_ratio, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resilience configuration used by the error handling registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Attempts per operation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the second attempt
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_retry_delay"
    )]
    pub retry_delay_ms: Duration,

    /// Upper bound on any single backoff delay
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_max_retry_delay"
    )]
    pub max_retry_delay_ms: Duration,

    /// Random jitter as a fraction of the delay (0.1 = ±10%)
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,

    /// Failures before a named circuit opens
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// How long an open circuit rejects calls
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_circuit_breaker_timeout"
    )]
    pub circuit_breaker_timeout: Duration,

    /// Run registered fallbacks once retries are exhausted
    #[serde(default = "crate::domains::utils::default_true")]
    pub graceful_degradation: bool,

    /// Number of errors retained in the history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Remote error reporting
    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// Remote error reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportingConfig {
    #[serde(default = "crate::domains::utils::default_false")]
    pub enabled: bool,

    /// Endpoint receiving JSON error reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
            jitter_ratio: default_jitter_ratio(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_timeout: default_circuit_breaker_timeout(),
            graceful_degradation: true,
            history_capacity: default_history_capacity(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl Validatable for ResilienceConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_retries, "max_retries", self.domain_name())?;
        validate_ratio(self.jitter_ratio, "jitter_ratio", self.domain_name())?;
        validate_positive(
            self.circuit_breaker_threshold,
            "circuit_breaker_threshold",
            self.domain_name(),
        )?;
        validate_positive(self.history_capacity, "history_capacity", self.domain_name())?;

        if self.retry_delay_ms > self.max_retry_delay_ms {
            return Err(self.validation_error(format!(
                "retry_delay_ms ({:?}) cannot exceed max_retry_delay_ms ({:?})",
                self.retry_delay_ms, self.max_retry_delay_ms
            )));
        }

        self.reporting.validate()?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "resilience"
    }
}

impl Validatable for ReportingConfig {
    fn validate(&self) -> ConfigResult<()> {
        match (&self.endpoint, self.enabled) {
            (Some(endpoint), _) => validate_url(endpoint, "endpoint", self.domain_name()),
            (None, true) => Err(self.validation_error("endpoint is required when reporting is enabled")),
            (None, false) => Ok(()),
        }
    }

    fn domain_name(&self) -> &'static str {
        "resilience.reporting"
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_retry_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_jitter_ratio() -> f64 {
    0.1
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_history_capacity() -> usize {
    1000
}
