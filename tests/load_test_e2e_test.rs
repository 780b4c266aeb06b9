//! Load and stress runs configured from YAML and driven through the API client

use anyhow::Result;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use waypoint_config::{ConfigLoader, WaypointConfig};
use waypoint_http::{ApiClient, HttpConfig};
use waypoint_loadtest::{LoadTestConfig, LoadTester};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_yaml(yaml: &str) -> Result<WaypointConfig> {
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;
    Ok(ConfigLoader::new().from_file(file.path())?)
}

fn tester_for(config: &WaypointConfig) -> Result<LoadTester> {
    let client = ApiClient::new(HttpConfig::from(config.http.clone()))?;
    Ok(LoadTester::new(Arc::new(client)))
}

#[tokio::test]
async fn test_configured_load_run_splits_failures_by_endpoint() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/universities"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = load_yaml(&format!(
        r#"
http:
  base_url: "{}"
  max_attempts: 1
  circuit_failure_threshold: 1000
load_test:
  concurrent_users: 2
  requests_per_user: 2
  target_rps: 200.0
  endpoints:
    - /api/v1/subjects
    - /api/v1/universities
"#,
        server.uri()
    ))?;

    let load = LoadTestConfig::from(&config.load_test);
    let results = tester_for(&config)?.run_load_test(&load).await;

    assert_eq!(results.total_requests, 4);
    assert_eq!(results.successful_requests, 2);
    assert_eq!(results.failed_requests, 2);
    assert_eq!(results.error_rate, 50.0);

    let universities = &results.endpoint_results["/api/v1/universities"];
    assert_eq!(universities.failed_requests, 2);
    assert_eq!(universities.error_rate, 100.0);
    assert_eq!(universities.failure_share, 100.0);
    assert_eq!(results.endpoint_results["/api/v1/subjects"].failed_requests, 0);

    assert_eq!(results.status_code_distribution.get(&200), Some(&2));
    assert_eq!(results.status_code_distribution.get(&500), Some(&2));
    assert!(results.min_response_time_ms <= results.max_response_time_ms);
    Ok(())
}

#[tokio::test]
async fn test_failing_api_reports_full_error_rate() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(10)
        .mount(&server)
        .await;

    let config = load_yaml(&format!(
        "http:\n  base_url: \"{}\"\n  max_attempts: 1\n  circuit_failure_threshold: 1000\n",
        server.uri()
    ))?;
    let load = LoadTestConfig::new(["/api/v1/careers"])
        .with_users(5, 2)
        .with_target_rps(500.0);

    let results = tester_for(&config)?.run_load_test(&load).await;

    assert_eq!(results.total_requests, 10);
    assert_eq!(results.failed_requests, 10);
    assert_eq!(results.error_rate, 100.0);
    assert!(!results.errors.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_healthy_api_survives_stress_ramp() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let config = load_yaml(&format!(
        r#"
http:
  base_url: "{}"
load_test:
  concurrent_users: 2
  requests_per_user: 2
  endpoints: ["/api/health"]
  stress:
    initial_rps: 100.0
    max_rps: 200.0
    rps_factor: 2.0
"#,
        server.uri()
    ))?;

    let load = LoadTestConfig::from(&config.load_test);
    let results = tester_for(&config)?.run_stress_test(&load).await;

    let rates: Vec<f64> = results.rounds.iter().map(|r| r.rps).collect();
    assert_eq!(rates, vec![100.0, 200.0]);
    assert!(results.rounds.iter().all(|r| !r.broke));
    assert_eq!(results.breaking_point_rps, None);
    assert!(results.recovery.is_none());
    assert_eq!(results.max_sustained_rps(), Some(200.0));
    Ok(())
}
