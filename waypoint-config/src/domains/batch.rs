//! Batch coordinator configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Operations taken per dispatch cycle
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Debounce before a queued operation is dispatched when no slot is free
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_batch_timeout"
    )]
    pub batch_timeout_ms: Duration,

    /// Batches allowed in flight at once
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Result polling interval used by `wait_for_result`
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_poll_interval"
    )]
    pub poll_interval_ms: Duration,

    /// Coalesce GET operations into one multi-URL request
    #[serde(default = "crate::domains::utils::default_true")]
    pub coalesce_gets: bool,

    /// Times a failed operation is requeued before its failure is recorded
    #[serde(default)]
    pub max_operation_retries: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            batch_timeout_ms: default_batch_timeout(),
            max_concurrent_batches: default_max_concurrent_batches(),
            poll_interval_ms: default_poll_interval(),
            coalesce_gets: true,
            max_operation_retries: 0,
        }
    }
}

impl Validatable for BatchConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_batch_size, "max_batch_size", self.domain_name())?;
        validate_positive(
            self.max_concurrent_batches,
            "max_concurrent_batches",
            self.domain_name(),
        )?;
        validate_positive(
            self.poll_interval_ms.as_millis(),
            "poll_interval_ms",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "batch"
    }
}

fn default_max_batch_size() -> usize {
    10
}

fn default_batch_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_max_concurrent_batches() -> usize {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}
