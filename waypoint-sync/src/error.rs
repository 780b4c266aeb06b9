//! Sync error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Offline queue I/O error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    #[error("Sync client is already running")]
    AlreadyRunning,
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Connection(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
