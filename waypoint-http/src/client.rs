//! Resilient API client
//!
//! [`ApiClient::request`] layers a client-wide circuit breaker, the response
//! cache and retry with doubling backoff over an [`HttpTransport`]. The
//! breaker, cache and error history are injected so that several clients can
//! share them on purpose while tests stay isolated.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use waypoint_caching::ResponseCache;
use waypoint_core::{RequestContext, SharedClock, SystemClock};
use waypoint_logging::ErrorInfo;
use waypoint_resilience::{
    CircuitBreaker, CircuitBreakerBuilder, ErrorHistory, RetryError, RetryExecutor, RetryPolicy,
    Retryable,
};

use crate::config::HttpConfig;
use crate::errors::HttpError;
use crate::transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
use crate::types::{
    ApiResponse, BatchGetRequest, BatchGetResponse, HttpMethod, RequestOptions,
    RequestPerformance,
};

/// Name of the client-wide breaker when none is injected
pub const API_CIRCUIT_NAME: &str = "api";

pub struct ApiClient {
    config: HttpConfig,
    transport: Arc<dyn HttpTransport>,
    breaker: CircuitBreaker,
    cache: Arc<ResponseCache>,
    history: Arc<ErrorHistory>,
    context: RequestContext,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl ApiClient {
    /// Client over reqwest with private breaker, cache and history
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        Self::builder(config).build()
    }

    pub fn builder(config: HttpConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn history(&self) -> &Arc<ErrorHistory> {
        &self.history
    }

    /// Issue a request with circuit breaking, caching, retries and fallback.
    ///
    /// With an open circuit the network is not touched: stale cache for
    /// `cache_key` is served if present, otherwise `fallback_data`. A fresh
    /// cache hit returns without a request. After the last failed attempt the
    /// breaker records one failure and the same stale-cache-then-fallback
    /// order applies, with `error` set.
    pub async fn request<T>(
        &self,
        endpoint: &str,
        options: RequestOptions,
        fallback_data: Option<T>,
        cache_key: Option<&str>,
    ) -> ApiResponse<T>
    where
        T: DeserializeOwned + Serialize + Send,
    {
        let started = Instant::now();

        if !self.breaker.allow_request() {
            debug!("Circuit '{}' open; skipping {}", self.breaker.name(), endpoint);
            let error = format!("Circuit breaker '{}' is open", self.breaker.name());
            return self
                .degrade(error, None, 0, fallback_data, cache_key, started)
                .await;
        }

        if let Some(key) = cache_key {
            match self.cache.get::<T>(key).await {
                Ok(Some(data)) => {
                    debug!("Cache hit for '{}'", key);
                    return ApiResponse {
                        data: Some(data),
                        error: None,
                        fallback: false,
                        cached: true,
                        performance: RequestPerformance {
                            duration: started.elapsed(),
                            retries: 0,
                            status_code: None,
                        },
                    };
                }
                Ok(None) => {}
                Err(e) => warn!("Cache read for '{}' failed: {}", key, e),
            }
        }

        let request = self.build_request(endpoint, &options);
        let executor = RetryExecutor::new(RetryPolicy::doubling(
            self.config.max_attempts,
            self.config.retry_base_delay,
        ));

        let outcome = executor
            .execute_with_context(|attempt| {
                let request = request.clone();
                async move { self.attempt::<T>(request, endpoint, attempt).await }
            })
            .await;

        match outcome {
            Ok((data, status, attempts)) => {
                self.breaker.record_success();
                if let Some(key) = cache_key {
                    if let Err(e) = self.cache.put(key, &data).await {
                        warn!("Failed to cache '{}': {}", key, e);
                    }
                }
                ApiResponse {
                    data: Some(data),
                    error: None,
                    fallback: false,
                    cached: false,
                    performance: RequestPerformance {
                        duration: started.elapsed(),
                        retries: attempts.saturating_sub(1),
                        status_code: Some(status),
                    },
                }
            }
            Err(retry_error) => {
                self.breaker.record_failure();
                let attempts = retry_error.attempts();
                let status = retry_error.inner().and_then(|e| e.status_code());
                let error = match retry_error {
                    RetryError::MaxAttemptsExceeded { last_error, .. } => last_error.to_string(),
                    RetryError::NonRetryableError { error, .. } => error.to_string(),
                    RetryError::CircuitBreakerOpen => "Circuit breaker is open".to_string(),
                };
                warn!(
                    "{} {} failed after {} attempt(s): {}",
                    options.method, endpoint, attempts, error
                );
                self.degrade(
                    error,
                    status,
                    attempts.saturating_sub(1),
                    fallback_data,
                    cache_key,
                    started,
                )
                .await
            }
        }
    }

    pub async fn get<T>(&self, endpoint: &str, cache_key: Option<&str>) -> ApiResponse<T>
    where
        T: DeserializeOwned + Serialize + Send,
    {
        self.request(endpoint, RequestOptions::get(), None, cache_key)
            .await
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> ApiResponse<T>
    where
        T: DeserializeOwned + Serialize + Send,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Post, endpoint, body).await
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> ApiResponse<T>
    where
        T: DeserializeOwned + Serialize + Send,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Put, endpoint, body).await
    }

    pub async fn patch<T, B>(&self, endpoint: &str, body: &B) -> ApiResponse<T>
    where
        T: DeserializeOwned + Serialize + Send,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Patch, endpoint, body).await
    }

    pub async fn delete<T>(&self, endpoint: &str) -> ApiResponse<T>
    where
        T: DeserializeOwned + Serialize + Send,
    {
        self.request(endpoint, RequestOptions::new(HttpMethod::Delete), None, None)
            .await
    }

    /// Fetch several URLs with one POST to the batch endpoint.
    ///
    /// Results come back in the order of `urls`.
    pub async fn get_many<S: AsRef<str>>(&self, urls: &[S]) -> ApiResponse<BatchGetResponse> {
        let body = match serde_json::to_value(BatchGetRequest::for_urls(urls)) {
            Ok(body) => body,
            Err(e) => return self.invalid_body(e),
        };
        let endpoint = self.config.batch_endpoint.clone();
        self.request(
            &endpoint,
            RequestOptions::new(HttpMethod::Post).with_body(body),
            None,
            None,
        )
        .await
    }

    /// Single GET of the health endpoint, outside the breaker and retries
    pub async fn health_check(&self) -> Result<Value, HttpError> {
        let options = RequestOptions::get();
        let request = self.build_request(&self.config.health_endpoint, &options);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(HttpError::from_response(response.status, &response.body));
        }
        info!("Health check passed ({})", response.status);
        parse_body(&response)
    }

    async fn send_json<T, B>(&self, method: HttpMethod, endpoint: &str, body: &B) -> ApiResponse<T>
    where
        T: DeserializeOwned + Serialize + Send,
        B: Serialize + ?Sized,
    {
        match serde_json::to_value(body) {
            Ok(body) => {
                self.request(endpoint, RequestOptions::new(method).with_body(body), None, None)
                    .await
            }
            Err(e) => self.invalid_body(e),
        }
    }

    fn invalid_body<T>(&self, err: serde_json::Error) -> ApiResponse<T> {
        ApiResponse {
            data: None,
            error: Some(HttpError::from(err).to_string()),
            fallback: false,
            cached: false,
            performance: RequestPerformance::default(),
        }
    }

    fn build_request(&self, endpoint: &str, options: &RequestOptions) -> TransportRequest {
        let mut request = TransportRequest::new(options.method, self.config.resolve(endpoint))
            .header("Accept", "application/json");

        let token = options
            .bearer_token
            .as_ref()
            .or(self.config.bearer_token.as_ref());
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        for (name, value) in &options.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(body) = &options.body {
            request = request.json(body.clone());
        }
        request.timeout = options.timeout;
        request
    }

    /// One network attempt; failures are classified into the history
    async fn attempt<T: DeserializeOwned>(
        &self,
        request: TransportRequest,
        endpoint: &str,
        attempt: u32,
    ) -> Result<(T, u16, u32), HttpError> {
        let result = match self.transport.send(request).await {
            Ok(response) if response.is_success() => {
                parse_body(&response).map(|data| (data, response.status, attempt))
            }
            Ok(response) => {
                if response.status == 503 {
                    debug!("Connection pooler unavailable for {}", endpoint);
                }
                Err(HttpError::from_response(response.status, &response.body))
            }
            Err(e) => Err(e),
        };

        if let Err(error) = &result {
            let mut info = ErrorInfo::classified(error.to_string(), error.status_code())
                .with_endpoint(endpoint)
                .with_retry_count(attempt.saturating_sub(1))
                .with_context(self.context.clone());
            if let Some(status) = error.status_code() {
                info = info.with_status_code(status);
            }
            self.history.record(info);
        }

        result
    }

    async fn degrade<T>(
        &self,
        error: String,
        status_code: Option<u16>,
        retries: u32,
        fallback_data: Option<T>,
        cache_key: Option<&str>,
        started: Instant,
    ) -> ApiResponse<T>
    where
        T: DeserializeOwned,
    {
        let performance = RequestPerformance {
            duration: started.elapsed(),
            retries,
            status_code,
        };

        if let Some(key) = cache_key {
            match self.cache.get_stale::<T>(key).await {
                Ok(Some(data)) => {
                    info!("Serving stale cache for '{}'", key);
                    return ApiResponse {
                        data: Some(data),
                        error: Some(error),
                        fallback: true,
                        cached: true,
                        performance,
                    };
                }
                Ok(None) => {}
                Err(e) => warn!("Stale cache read for '{}' failed: {}", key, e),
            }
        }

        let fallback = fallback_data.is_some();
        ApiResponse {
            data: fallback_data,
            error: Some(error),
            fallback,
            cached: false,
            performance,
        }
    }
}

fn parse_body<T: DeserializeOwned>(response: &TransportResponse) -> Result<T, HttpError> {
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    Ok(serde_json::from_str(body)?)
}

pub struct ApiClientBuilder {
    config: HttpConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    breaker: Option<CircuitBreaker>,
    cache: Option<Arc<ResponseCache>>,
    history: Option<Arc<ErrorHistory>>,
    clock: SharedClock,
    context: RequestContext,
}

impl ApiClientBuilder {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            transport: None,
            breaker: None,
            cache: None,
            history: None,
            clock: SystemClock::shared(),
            context: RequestContext::default(),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share a breaker; clones of a [`CircuitBreaker`] share state
    pub fn circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn history(mut self, history: Arc<ErrorHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Clock for the default breaker
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn request_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn build(self) -> Result<ApiClient, HttpError> {
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let breaker = self.breaker.unwrap_or_else(|| {
            CircuitBreakerBuilder::new(API_CIRCUIT_NAME)
                .failure_threshold(self.config.circuit_failure_threshold)
                .timeout(self.config.circuit_timeout)
                .clock(self.clock.clone())
                .build()
        });

        Ok(ApiClient {
            transport,
            breaker,
            cache: self.cache.unwrap_or_default(),
            history: self.history.unwrap_or_default(),
            context: self.context,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;
    use waypoint_core::MockClock;

    /// Replays canned responses and records what was sent
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, HttpError>>>,
        sent: Mutex<Vec<TransportRequest>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<Result<TransportResponse, HttpError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, HttpError> {
            self.sent.lock().push(request);
            self.responses.lock().pop_front().unwrap_or(Ok(TransportResponse {
                status: 500,
                body: String::new(),
            }))
        }
    }

    fn ok(body: Value) -> Result<TransportResponse, HttpError> {
        Ok(TransportResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn status(code: u16) -> Result<TransportResponse, HttpError> {
        Ok(TransportResponse {
            status: code,
            body: String::new(),
        })
    }

    fn client(transport: Arc<ScriptedTransport>, clock: &MockClock) -> ApiClient {
        let config = HttpConfig {
            retry_base_delay: Duration::from_millis(10),
            bearer_token: Some("secret".to_string()),
            ..Default::default()
        };
        ApiClient::builder(config)
            .transport(transport)
            .clock(clock.shared())
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_503_then_succeeds() {
        let transport = ScriptedTransport::with(vec![status(503), ok(json!({"id": 1}))]);
        let client = client(transport.clone(), &MockClock::new());

        let response: ApiResponse<Value> = client.get("/api/v1/subjects", None).await;

        assert!(response.is_success());
        assert_eq!(response.performance.retries, 1);
        assert_eq!(transport.sent(), 2);
        assert_eq!(client.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let transport = ScriptedTransport::with(vec![Ok(TransportResponse {
            status: 404,
            body: r#"{"error":"Career not found"}"#.to_string(),
        })]);
        let client = client(transport.clone(), &MockClock::new());

        let response: ApiResponse<Value> = client.get("/api/v1/careers/9", None).await;

        assert_eq!(transport.sent(), 1);
        assert_eq!(response.error.as_deref(), Some("HTTP 404: Career not found"));
        assert_eq!(response.performance.status_code, Some(404));
        assert!(!response.fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_use_fallback_data() {
        let transport = ScriptedTransport::with(vec![status(500), status(502), status(503)]);
        let client = client(transport.clone(), &MockClock::new());

        let response = client
            .request(
                "/api/v1/subjects",
                RequestOptions::get(),
                Some(json!([])),
                None,
            )
            .await;

        assert_eq!(transport.sent(), 3);
        assert!(response.fallback);
        assert!(!response.cached);
        assert_eq!(response.data, Some(json!([])));
        assert_eq!(response.performance.retries, 2);
        assert_eq!(client.circuit_breaker().snapshot().failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_network() {
        let transport = ScriptedTransport::with(vec![ok(json!({"name": "Biology"}))]);
        let client = client(transport.clone(), &MockClock::new());

        let first: ApiResponse<Value> = client.get("/api/v1/subjects/3", Some("subject:3")).await;
        let second: ApiResponse<Value> = client.get("/api/v1/subjects/3", Some("subject:3")).await;

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.performance.retries, 0);
        assert_eq!(second.data, first.data);
        assert_eq!(transport.sent(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_serves_stale_cache_without_network() {
        let clock = MockClock::new();
        let transport = ScriptedTransport::with(vec![ok(json!({"name": "Physics"}))]);
        let cache = Arc::new(ResponseCache::with_clock(
            waypoint_caching::CacheConfig {
                default_ttl: Duration::from_secs(1),
                ..Default::default()
            },
            clock.shared(),
        ));
        let config = HttpConfig {
            retry_base_delay: Duration::from_millis(10),
            circuit_failure_threshold: 1,
            ..Default::default()
        };
        let client = ApiClient::builder(config)
            .transport(transport.clone())
            .cache(cache)
            .clock(clock.shared())
            .build()
            .unwrap();

        let _: ApiResponse<Value> = client.get("/api/v1/subjects/4", Some("subject:4")).await;
        clock.advance(Duration::from_secs(5));
        // Scripted transport now answers 500 for every attempt
        let failed: ApiResponse<Value> = client.get("/api/v1/subjects/4", Some("subject:4")).await;
        assert!(failed.fallback && failed.cached);
        assert!(client.circuit_breaker().is_open());

        let sent_before = transport.sent();
        let short_circuited: ApiResponse<Value> =
            client.get("/api/v1/subjects/4", Some("subject:4")).await;
        assert_eq!(transport.sent(), sent_before);
        assert!(short_circuited.cached);
        assert_eq!(short_circuited.data, Some(json!({"name": "Physics"})));
        assert!(short_circuited.error.unwrap().contains("open"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bearer_token_and_json_body_sent() {
        let transport = ScriptedTransport::with(vec![ok(json!({"id": 12}))]);
        let client = client(transport.clone(), &MockClock::new());

        let response: ApiResponse<Value> = client
            .post("/api/admin/courses", &json!({"title": "Chemistry"}))
            .await;
        assert!(response.is_success());

        let sent = transport.sent.lock();
        let request = &sent[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://localhost:3000/api/admin/courses");
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer secret"));
        assert_eq!(request.body, Some(json!({"title": "Chemistry"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_request_options_override_client_defaults() {
        let transport = ScriptedTransport::with(vec![ok(json!({"deleted": true}))]);
        let client = client(transport.clone(), &MockClock::new());

        let options = RequestOptions::new(HttpMethod::Delete)
            .with_bearer_token("admin-token")
            .with_header("X-Request-Source", "admin-panel")
            .with_timeout(Duration::from_secs(2));
        let response: ApiResponse<Value> = client
            .request("/api/admin/careers/7", options, None, None)
            .await;
        assert!(response.is_success());

        let sent = transport.sent.lock();
        let request = &sent[0];
        assert_eq!(request.timeout, Some(Duration::from_secs(2)));
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer admin-token"));
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "X-Request-Source" && v == "admin-panel"));
        assert!(!request.headers.iter().any(|(_, v)| v == "Bearer secret"));
    }
}
