//! Request seam for the load driver

use async_trait::async_trait;
use serde_json::Value;
use waypoint_http::ApiClient;

/// Outcome of a single load request
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl TargetOutcome {
    pub fn ok(status_code: u16) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            error: None,
        }
    }

    pub fn failed(status_code: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            error: Some(error.into()),
        }
    }
}

/// Something a virtual user can hit
#[async_trait]
pub trait LoadTarget: Send + Sync {
    async fn hit(&self, endpoint: &str) -> TargetOutcome;
}

#[async_trait]
impl LoadTarget for ApiClient {
    async fn hit(&self, endpoint: &str) -> TargetOutcome {
        let response = self.get::<Value>(endpoint, None).await;
        match response.error {
            None => TargetOutcome {
                success: true,
                status_code: response.performance.status_code,
                error: None,
            },
            Some(error) => TargetOutcome::failed(response.performance.status_code, error),
        }
    }
}
