use crate::severity::ErrorSeverity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use waypoint_core::RequestContext;

/// Broad category of a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Network,
    Timeout,
    /// 5xx responses
    Server,
    /// 4xx responses
    Client,
    #[default]
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Network => "network",
            ErrorType::Timeout => "timeout",
            ErrorType::Server => "server",
            ErrorType::Client => "client",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub severity: ErrorSeverity,
    pub message: String,
    /// Endpoint or logical operation the failure came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub retry_count: u32,
    #[serde(flatten)]
    pub context: RequestContext,
}

impl ErrorInfo {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            error_type,
            severity: ErrorSeverity::default(),
            message: message.into(),
            endpoint: None,
            status_code: None,
            retry_count: 0,
            context: RequestContext::default(),
        }
    }

    /// Build a record whose type and severity come from [`classify`]
    ///
    /// Without an explicit status code, one named in the message is used.
    pub fn classified(message: impl Into<String>, status_code: Option<u16>) -> Self {
        let message = message.into();
        let status_code = status_code.or_else(|| status_in_message(&message));
        let (error_type, severity) = classify(&message, status_code);
        let mut info = Self::new(error_type, message).with_severity(severity);
        info.status_code = status_code;
        info
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Find a status code written as `HTTP 503`, `status 404` or `code 502`
fn status_in_message(message: &str) -> Option<u16> {
    let tokens: Vec<&str> = message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.windows(2).find_map(|pair| {
        let marker = pair[0].to_ascii_lowercase();
        if !matches!(marker.as_str(), "http" | "status" | "code") {
            return None;
        }
        let digits = pair[1];
        if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().filter(|code| (100..=599).contains(code))
    })
}

/// Derive the error type and severity from a status code or, failing that,
/// from keywords in the message.
pub fn classify(message: &str, status_code: Option<u16>) -> (ErrorType, ErrorSeverity) {
    if let Some(status) = status_code.or_else(|| status_in_message(message)) {
        match status {
            408 => return (ErrorType::Timeout, ErrorSeverity::Medium),
            401 | 403 => return (ErrorType::Client, ErrorSeverity::Medium),
            429 => return (ErrorType::Client, ErrorSeverity::Medium),
            400..=499 => return (ErrorType::Client, ErrorSeverity::Low),
            500 => return (ErrorType::Server, ErrorSeverity::Critical),
            500..=599 => return (ErrorType::Server, ErrorSeverity::High),
            _ => {}
        }
    }

    let lower = message.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline") {
        return (ErrorType::Timeout, ErrorSeverity::Medium);
    }

    const NETWORK_KEYWORDS: &[&str] = &[
        "network",
        "connection",
        "connect",
        "dns",
        "refused",
        "reset",
        "unreachable",
        "fetch",
    ];
    if NETWORK_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return (ErrorType::Network, ErrorSeverity::High);
    }

    if lower.contains("internal server") || lower.contains("service unavailable") {
        return (ErrorType::Server, ErrorSeverity::High);
    }

    if lower.contains("unauthorized") || lower.contains("forbidden") || lower.contains("not found")
    {
        return (ErrorType::Client, ErrorSeverity::Low);
    }

    (ErrorType::Unknown, ErrorSeverity::Medium)
}
