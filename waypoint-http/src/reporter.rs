//! Error reporting over HTTP

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use waypoint_logging::ErrorInfo;
use waypoint_resilience::{ErrorReporter, ReportError};

use crate::transport::{HttpTransport, TransportRequest};
use crate::types::HttpMethod;

/// POSTs each [`ErrorInfo`] as JSON to a reporting endpoint
pub struct HttpErrorReporter {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpErrorReporter {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ErrorReporter for HttpErrorReporter {
    async fn report(&self, error: &ErrorInfo) -> Result<(), ReportError> {
        let body = serde_json::to_value(error).map_err(|e| ReportError(e.to_string()))?;
        let mut request = TransportRequest::new(HttpMethod::Post, &self.endpoint).json(body);
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ReportError(e.to_string()))?;

        if !response.is_success() {
            return Err(ReportError(format!(
                "reporting endpoint answered {}",
                response.status
            )));
        }
        debug!("Reported error {} to {}", error.id, self.endpoint);
        Ok(())
    }
}
