//! End-to-end behaviour of the API client against a mock server
//!
//! Covers stale cache fallback during an outage, the global circuit breaker
//! and recovery once the breaker timeout elapses.

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use waypoint_caching::{CacheConfig, ResponseCache};
use waypoint_core::MockClock;
use waypoint_http::{ApiClient, ApiResponse, HttpConfig, RequestOptions};
use waypoint_resilience::CircuitState;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_config(server: &MockServer, max_attempts: u32, threshold: u32) -> HttpConfig {
    HttpConfig {
        max_attempts,
        retry_base_delay: Duration::from_millis(5),
        circuit_failure_threshold: threshold,
        circuit_timeout: Duration::from_secs(30),
        ..Default::default()
    }
    .with_base_url(server.uri())
}

#[tokio::test]
async fn test_outage_served_from_stale_cache() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Biology"}])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subjects"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let cache = ResponseCache::with_clock(
        CacheConfig {
            default_ttl: Duration::from_secs(60),
            max_stale: Duration::from_secs(600),
            ..Default::default()
        },
        clock.shared(),
    );
    let client = ApiClient::builder(http_config(&server, 3, 10))
        .cache(Arc::new(cache))
        .build()?;

    let first: ApiResponse<Value> = client.get("/api/v1/subjects", Some("subjects")).await;
    assert!(first.is_success());
    assert!(!first.cached);

    // fresh hit, no request
    let second: ApiResponse<Value> = client.get("/api/v1/subjects", Some("subjects")).await;
    assert!(second.cached);
    assert!(!second.fallback);

    clock.advance(Duration::from_secs(120));
    let during_outage: ApiResponse<Value> = client.get("/api/v1/subjects", Some("subjects")).await;
    assert!(during_outage.is_degraded());
    assert!(during_outage.cached);
    assert_eq!(during_outage.performance.status_code, Some(503));
    assert_eq!(during_outage.data.unwrap()[0]["name"], "Biology");

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1 + 3);
    Ok(())
}

#[tokio::test]
async fn test_breaker_opens_and_short_circuits() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/careers"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = ApiClient::new(http_config(&server, 1, 2))?;
    for _ in 0..2 {
        let response: ApiResponse<Value> = client.get("/api/v1/careers", None).await;
        assert!(response.error.is_some());
    }
    assert_eq!(client.circuit_breaker().state(), CircuitState::Open);

    let fallback = json!([{"id": 0, "title": "Offline career list"}]);
    let response: ApiResponse<Value> = client
        .request("/api/v1/careers", RequestOptions::get(), Some(fallback.clone()), None)
        .await;

    assert!(response.is_degraded());
    assert_eq!(response.data, Some(fallback));
    assert!(response.error.unwrap().contains("open"));
    assert_eq!(response.performance.status_code, None);
    Ok(())
}

#[tokio::test]
async fn test_breaker_recovers_after_timeout() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let client = ApiClient::builder(http_config(&server, 1, 1))
        .clock(clock.shared())
        .build()?;

    let failed: ApiResponse<Value> = client.get("/api/health", None).await;
    assert!(failed.error.is_some());
    assert!(client.circuit_breaker().is_open());

    clock.advance(Duration::from_secs(31));
    let recovered: ApiResponse<Value> = client.get("/api/health", None).await;
    assert!(recovered.is_success(), "error: {:?}", recovered.error);

    let snapshot = client.circuit_breaker().snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
    Ok(())
}
