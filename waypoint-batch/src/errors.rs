//! Batch coordinator errors

use std::time::Duration;
use thiserror::Error;

pub type BatchResult<T> = Result<T, BatchError>;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Timed out after {waited:?} waiting for operation {id}")]
    Timeout { id: String, waited: Duration },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid batch configuration: {0}")]
    InvalidConfiguration(String),
}
