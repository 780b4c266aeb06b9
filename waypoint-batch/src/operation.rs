//! Queued operations and their results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use waypoint_core::Priority;
use waypoint_http::HttpMethod;

/// One queued unit of HTTP work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub method: HttpMethod,
    pub url: String,
    pub data: Option<Value>,
    pub priority: Priority,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
    /// Ids that must leave the queue before this one is dispatched
    pub dependencies: Vec<String>,
    /// Circuit breaker key
    pub name: String,
    /// Enqueue order, for FIFO tie-breaking
    pub sequence: u64,
}

impl Operation {
    pub fn is_get(&self) -> bool {
        self.method == HttpMethod::Get
    }

    /// Sort key: priority first, then enqueue order
    pub(crate) fn dispatch_key(&self) -> (Priority, u64) {
        (self.priority, self.sequence)
    }
}

/// Breaker key for an operation with no explicit name: `"{METHOD} {path}"`
/// with scheme, host and query string removed
pub fn default_operation_name(method: HttpMethod, url: &str) -> String {
    let without_origin = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        }
        None => url,
    };
    let path = without_origin
        .split(['?', '#'])
        .next()
        .unwrap_or(without_origin);
    format!("{} {}", method, path)
}

/// Builder form of [`crate::BatchCoordinator::add_operation`]
#[derive(Debug, Clone, Default)]
pub struct OperationRequest {
    pub method: HttpMethod,
    pub url: String,
    pub data: Option<Value>,
    pub priority: Priority,
    pub dependencies: Vec<String>,
    pub name: Option<String>,
}

impl OperationRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>, data: Value) -> Self {
        Self::new(HttpMethod::Post, url).with_data(data)
    }

    pub fn put(url: impl Into<String>, data: Value) -> Self {
        Self::new(HttpMethod::Put, url).with_data(data)
    }

    pub fn patch(url: impl Into<String>, data: Value) -> Self {
        Self::new(HttpMethod::Patch, url).with_data(data)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Override the circuit breaker key
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Outcome of one operation; written once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub response_time: Duration,
    pub completed_at: DateTime<Utc>,
    pub retry_count: u32,
    /// Sequence number of the batch that produced this result
    pub batch: u64,
}

impl OperationResult {
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "operation failed".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_operation_name_strips_query_and_origin() {
        assert_eq!(
            default_operation_name(HttpMethod::Get, "/api/v1/subjects?page=2"),
            "GET /api/v1/subjects"
        );
        assert_eq!(
            default_operation_name(HttpMethod::Delete, "https://api.example.com/api/admin/tags/4"),
            "DELETE /api/admin/tags/4"
        );
        assert_eq!(
            default_operation_name(HttpMethod::Post, "http://localhost:3000"),
            "POST /"
        );
    }

    #[test]
    fn test_request_builder() {
        let request = OperationRequest::post("/api/admin/courses", serde_json::json!({"t": 1}))
            .with_priority(Priority::High)
            .depends_on("op-1")
            .named("create-course");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.priority, Priority::High);
        assert_eq!(request.dependencies, vec!["op-1".to_string()]);
        assert_eq!(request.name.as_deref(), Some("create-course"));
    }
}
