//! Resilient API client for Waypoint
//!
//! [`ApiClient`] wraps an [`HttpTransport`] with a circuit breaker, a response
//! cache with stale fallback, retries with doubling backoff and error
//! classification. [`HttpErrorReporter`] ships classified errors to a
//! reporting endpoint.

pub mod client;
pub mod config;
pub mod errors;
pub mod reporter;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{ApiClient, ApiClientBuilder, API_CIRCUIT_NAME};
pub use config::HttpConfig;
pub use errors::HttpError;
pub use reporter::HttpErrorReporter;
pub use transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
pub use types::{
    ApiResponse, BatchGetItem, BatchGetRequest, BatchGetResponse, BatchGetResult, HttpMethod,
    HttpMethodError, RequestOptions, RequestPerformance,
};
