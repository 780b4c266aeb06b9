//! HTTP error types

use waypoint_resilience::Retryable;

use crate::types::HttpMethodError;

/// Error type for HTTP operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-2xx response; `message` is taken from the response body
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(#[from] HttpMethodError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl HttpError {
    /// Build a status error from a response body, preferring its
    /// `error`/`message` field when the body is JSON
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| {
                ["error", "message"]
                    .iter()
                    .find_map(|field| json.get(field).and_then(|v| v.as_str()).map(str::to_string))
            })
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown Status")
                    .to_string()
            });

        HttpError::Status { status, message }
    }

    /// 503 from the connection pooler in front of the backend
    pub fn is_pooler_unavailable(&self) -> bool {
        matches!(self, HttpError::Status { status: 503, .. })
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout(err.to_string())
        } else if err.is_builder() {
            HttpError::InvalidUrl(err.to_string())
        } else if err.is_decode() {
            HttpError::InvalidJson(err.to_string())
        } else {
            HttpError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::InvalidJson(err.to_string())
    }
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            HttpError::NetworkError(_) | HttpError::Timeout(_) => true,
            HttpError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
