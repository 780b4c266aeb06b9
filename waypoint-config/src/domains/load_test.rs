//! Load and stress test defaults

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Load test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTestConfig {
    #[serde(default = "default_concurrent_users")]
    pub concurrent_users: usize,

    #[serde(default = "default_requests_per_user")]
    pub requests_per_user: usize,

    #[serde(default = "default_target_rps")]
    pub target_rps: f64,

    /// Endpoints visited in rotation
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    #[serde(default)]
    pub stress: StressTestConfig,
}

/// Stress test ramp configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressTestConfig {
    #[serde(default = "default_initial_rps")]
    pub initial_rps: f64,

    #[serde(default = "default_max_rps")]
    pub max_rps: f64,

    /// Multiplier applied to the RPS after each passing round
    #[serde(default = "default_rps_factor")]
    pub rps_factor: f64,

    /// Error rate (percent) that marks the breaking point
    #[serde(default = "default_breaking_error_rate")]
    pub breaking_error_rate: f64,

    /// Mean response time that marks the breaking point
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_breaking_response_time"
    )]
    pub breaking_response_time_ms: Duration,

    /// Pause between detecting the breaking point and the recovery probe
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_recovery_wait"
    )]
    pub recovery_wait: Duration,

    /// Error rate (percent) below which the system counts as recovered
    #[serde(default = "default_recovery_error_rate")]
    pub recovery_error_rate: f64,

    /// Mean response time below which the system counts as recovered
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_recovery_response_time"
    )]
    pub recovery_response_time_ms: Duration,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            concurrent_users: default_concurrent_users(),
            requests_per_user: default_requests_per_user(),
            target_rps: default_target_rps(),
            endpoints: default_endpoints(),
            stress: StressTestConfig::default(),
        }
    }
}

impl Default for StressTestConfig {
    fn default() -> Self {
        Self {
            initial_rps: default_initial_rps(),
            max_rps: default_max_rps(),
            rps_factor: default_rps_factor(),
            breaking_error_rate: default_breaking_error_rate(),
            breaking_response_time_ms: default_breaking_response_time(),
            recovery_wait: default_recovery_wait(),
            recovery_error_rate: default_recovery_error_rate(),
            recovery_response_time_ms: default_recovery_response_time(),
        }
    }
}

impl Validatable for LoadTestConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.concurrent_users, "concurrent_users", self.domain_name())?;
        validate_positive(self.requests_per_user, "requests_per_user", self.domain_name())?;
        validate_positive(self.target_rps, "target_rps", self.domain_name())?;
        if self.endpoints.is_empty() {
            return Err(self.validation_error("at least one endpoint is required"));
        }
        self.stress.validate()
    }

    fn domain_name(&self) -> &'static str {
        "load_test"
    }
}

impl Validatable for StressTestConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.initial_rps, "initial_rps", self.domain_name())?;
        if self.rps_factor <= 1.0 {
            return Err(self.validation_error(format!(
                "rps_factor must be greater than 1.0, got {}",
                self.rps_factor
            )));
        }
        if self.max_rps < self.initial_rps {
            return Err(self.validation_error("max_rps cannot be lower than initial_rps"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "load_test.stress"
    }
}

fn default_concurrent_users() -> usize {
    10
}

fn default_requests_per_user() -> usize {
    10
}

fn default_target_rps() -> f64 {
    50.0
}

fn default_endpoints() -> Vec<String> {
    vec!["/api/health".to_string()]
}

fn default_initial_rps() -> f64 {
    10.0
}

fn default_max_rps() -> f64 {
    1000.0
}

fn default_rps_factor() -> f64 {
    1.5
}

fn default_breaking_error_rate() -> f64 {
    5.0
}

fn default_breaking_response_time() -> Duration {
    Duration::from_millis(5000)
}

fn default_recovery_wait() -> Duration {
    Duration::from_secs(10)
}

fn default_recovery_error_rate() -> f64 {
    1.0
}

fn default_recovery_response_time() -> Duration {
    Duration::from_millis(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stress_defaults() {
        let config = StressTestConfig::default();
        assert_eq!(config.rps_factor, 1.5);
        assert_eq!(config.max_rps, 1000.0);
        assert_eq!(config.recovery_wait, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_test_requires_endpoints() {
        let config = LoadTestConfig {
            endpoints: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
