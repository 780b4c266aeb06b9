//! HTTP types and enums

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// HTTP methods supported by the Waypoint API client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// Get the string representation of the HTTP method
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = HttpMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(HttpMethodError::InvalidMethod(s.to_string())),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Errors that can occur when parsing HTTP methods
#[derive(Error, Debug, Clone)]
pub enum HttpMethodError {
    #[error("Invalid HTTP method: '{0}'. Supported methods are: GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS")]
    InvalidMethod(String),
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
    /// Overrides the client's configured token
    pub bearer_token: Option<String>,
    /// Overrides the client's configured timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Timing and attempt bookkeeping for one `request` call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestPerformance {
    pub duration: Duration,
    /// Attempts beyond the first
    pub retries: u32,
    /// Status of the last response seen, if any
    pub status_code: Option<u16>,
}

/// Outcome of [`crate::ApiClient::request`]
///
/// Failures never surface as `Err`: `error` is populated and `data` holds
/// stale cache or the caller's fallback when one was available.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    /// Data did not come from a live successful request
    pub fallback: bool,
    /// Data came from the response cache
    pub cached: bool,
    pub performance: RequestPerformance,
}

impl<T> ApiResponse<T> {
    /// Live or cached data with no error
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.data.is_some()
    }

    /// Data is present but only because the live path failed
    pub fn is_degraded(&self) -> bool {
        self.fallback && self.data.is_some()
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err("response carried no data".to_string()),
        }
    }
}

/// One entry of a coalesced GET request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGetItem {
    pub method: HttpMethod,
    pub url: String,
}

/// Body sent to the batch endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGetRequest {
    pub requests: Vec<BatchGetItem>,
}

impl BatchGetRequest {
    pub fn for_urls<S: AsRef<str>>(urls: &[S]) -> Self {
        Self {
            requests: urls
                .iter()
                .map(|url| BatchGetItem {
                    method: HttpMethod::Get,
                    url: url.as_ref().to_string(),
                })
                .collect(),
        }
    }
}

/// Per-URL result returned by the batch endpoint, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGetResult {
    pub status: u16,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BatchGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGetResponse {
    pub responses: Vec<BatchGetResult>,
}
