//! Runtime load test configuration

use std::time::Duration;

/// Shape of one load test run
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestConfig {
    pub concurrent_users: usize,
    pub requests_per_user: usize,
    /// Aggregate request rate the users are paced towards
    pub target_rps: f64,
    /// Endpoints visited in rotation
    pub endpoints: Vec<String>,
    pub stress: StressTestConfig,
}

/// Ramp and recovery thresholds for the stress test
#[derive(Debug, Clone, PartialEq)]
pub struct StressTestConfig {
    pub initial_rps: f64,
    pub max_rps: f64,
    pub rps_factor: f64,
    /// Percent
    pub breaking_error_rate: f64,
    pub breaking_response_time: Duration,
    pub recovery_wait: Duration,
    /// Percent
    pub recovery_error_rate: f64,
    pub recovery_response_time: Duration,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self::from(&waypoint_config::LoadTestConfig::default())
    }
}

impl Default for StressTestConfig {
    fn default() -> Self {
        Self::from(&waypoint_config::StressTestConfig::default())
    }
}

impl From<&waypoint_config::LoadTestConfig> for LoadTestConfig {
    fn from(config: &waypoint_config::LoadTestConfig) -> Self {
        Self {
            concurrent_users: config.concurrent_users,
            requests_per_user: config.requests_per_user,
            target_rps: config.target_rps,
            endpoints: config.endpoints.clone(),
            stress: StressTestConfig::from(&config.stress),
        }
    }
}

impl From<&waypoint_config::StressTestConfig> for StressTestConfig {
    fn from(config: &waypoint_config::StressTestConfig) -> Self {
        Self {
            initial_rps: config.initial_rps,
            max_rps: config.max_rps,
            rps_factor: config.rps_factor,
            breaking_error_rate: config.breaking_error_rate,
            breaking_response_time: config.breaking_response_time_ms,
            recovery_wait: config.recovery_wait,
            recovery_error_rate: config.recovery_error_rate,
            recovery_response_time: config.recovery_response_time_ms,
        }
    }
}

impl LoadTestConfig {
    pub fn new<S: Into<String>>(endpoints: impl IntoIterator<Item = S>) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_users(mut self, concurrent_users: usize, requests_per_user: usize) -> Self {
        self.concurrent_users = concurrent_users;
        self.requests_per_user = requests_per_user;
        self
    }

    pub fn with_target_rps(mut self, target_rps: f64) -> Self {
        self.target_rps = target_rps;
        self
    }

    pub fn with_stress(mut self, stress: StressTestConfig) -> Self {
        self.stress = stress;
        self
    }

    /// Gap between two requests of one virtual user.
    ///
    /// Users run side by side, so each waits `users / rps` seconds for the
    /// aggregate rate to land on `target_rps`. Zero when no rate is set.
    pub fn request_interval(&self) -> Duration {
        if self.target_rps <= 0.0 || !self.target_rps.is_finite() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.concurrent_users.max(1) as f64 / self.target_rps)
    }

    pub fn total_requests(&self) -> usize {
        self.concurrent_users * self.requests_per_user
    }
}
