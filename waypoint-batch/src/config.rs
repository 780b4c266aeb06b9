//! Coordinator runtime configuration

use std::time::Duration;

use crate::errors::{BatchError, BatchResult};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Operations per dispatch cycle
    pub max_batch_size: usize,
    /// Debounce before a queued operation is dispatched while all slots are busy
    pub batch_timeout: Duration,
    pub max_concurrent_batches: usize,
    /// How often `wait_for_result` and `flush` check for progress
    pub poll_interval: Duration,
    pub coalesce_gets: bool,
    /// Times a failed operation is requeued before its failure is recorded
    pub max_operation_retries: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from(&waypoint_config::BatchConfig::default())
    }
}

impl From<&waypoint_config::BatchConfig> for BatchConfig {
    fn from(config: &waypoint_config::BatchConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            batch_timeout: config.batch_timeout_ms,
            max_concurrent_batches: config.max_concurrent_batches,
            poll_interval: config.poll_interval_ms,
            coalesce_gets: config.coalesce_gets,
            max_operation_retries: config.max_operation_retries,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> BatchResult<()> {
        if self.max_batch_size == 0 {
            return Err(BatchError::InvalidConfiguration(
                "max_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_batches == 0 {
            return Err(BatchError::InvalidConfiguration(
                "max_concurrent_batches must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(BatchError::InvalidConfiguration(
                "poll_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
