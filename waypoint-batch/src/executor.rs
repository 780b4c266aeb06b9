//! Execution seam between the coordinator and the network

use async_trait::async_trait;
use serde_json::Value;
use waypoint_http::{ApiClient, BatchGetResult, RequestOptions};

use crate::operation::Operation;

/// Runs operations on behalf of the coordinator
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Execute one operation
    async fn execute(&self, operation: &Operation) -> Result<Value, String>;

    /// Fetch several GET urls in one call; results in input order.
    ///
    /// An `Err` makes the coordinator fall back to one `execute` per url.
    async fn execute_many(&self, urls: &[String]) -> Result<Vec<Result<Value, String>>, String> {
        let _ = urls;
        Err("coalesced requests are not supported".to_string())
    }
}

#[async_trait]
impl OperationExecutor for ApiClient {
    async fn execute(&self, operation: &Operation) -> Result<Value, String> {
        let mut options = RequestOptions::new(operation.method);
        if let Some(data) = &operation.data {
            options = options.with_body(data.clone());
        }
        self.request::<Value>(&operation.url, options, None, None)
            .await
            .into_result()
    }

    async fn execute_many(&self, urls: &[String]) -> Result<Vec<Result<Value, String>>, String> {
        let batch = self.get_many(urls).await.into_result()?;
        if batch.responses.len() != urls.len() {
            return Err(format!(
                "batch endpoint returned {} results for {} urls",
                batch.responses.len(),
                urls.len()
            ));
        }
        Ok(batch.responses.into_iter().map(per_url_result).collect())
    }
}

fn per_url_result(result: BatchGetResult) -> Result<Value, String> {
    if result.is_success() {
        Ok(result.data.unwrap_or(Value::Null))
    } else {
        Err(result
            .error
            .unwrap_or_else(|| format!("HTTP {}", result.status)))
    }
}
