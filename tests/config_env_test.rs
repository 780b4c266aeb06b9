//! Environment overrides flowing from the config loader into each runtime component

use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;
use tempfile::NamedTempFile;
use waypoint_config::{ConfigLoader, LogLevel};
use waypoint_resilience::ErrorHandlerConfig;

const YAML: &str = r#"
http:
  base_url: "https://api.careers.example"
  timeout: 20
  max_attempts: 4
cache:
  max_entries: 250
resilience:
  max_retries: 2
  circuit_breaker_threshold: 6
batch:
  max_batch_size: 8
"#;

fn yaml_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(YAML.as_bytes()).unwrap();
    file
}

#[test]
fn test_file_values_reach_runtime_configs() {
    let file = yaml_file();
    with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        let http = waypoint_http::HttpConfig::from(config.http.clone());
        assert_eq!(http.base_url, "https://api.careers.example");
        assert_eq!(http.timeout, Duration::from_secs(20));
        assert_eq!(http.max_attempts, 4);

        let cache = waypoint_caching::CacheConfig::from(&config.cache);
        assert_eq!(cache.max_entries, 250);

        let handler = ErrorHandlerConfig::from(&config.resilience);
        assert_eq!(handler.max_retries, 2);
        assert_eq!(handler.circuit_breaker.failure_threshold, 6);

        let batch = waypoint_batch::BatchConfig::from(&config.batch);
        assert_eq!(batch.max_batch_size, 8);
    });
}

#[test]
fn test_env_overrides_file_values() {
    let file = yaml_file();
    let vars = vec![
        ("WAYPOINT_HTTP_BASE_URL", Some("https://staging.careers.example")),
        ("WAYPOINT_HTTP_BEARER_TOKEN", Some("staging-token")),
        ("WAYPOINT_CACHE_MAX_ENTRIES", Some("40")),
        ("WAYPOINT_CIRCUIT_BREAKER_THRESHOLD", Some("2")),
        ("WAYPOINT_BATCH_MAX_SIZE", Some("3")),
        ("WAYPOINT_LOG_LEVEL", Some("debug")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        let http = waypoint_http::HttpConfig::from(config.http.clone());
        assert_eq!(http.base_url, "https://staging.careers.example");
        assert_eq!(http.bearer_token.as_deref(), Some("staging-token"));
        // untouched file values survive
        assert_eq!(http.max_attempts, 4);

        assert_eq!(waypoint_caching::CacheConfig::from(&config.cache).max_entries, 40);
        assert_eq!(
            ErrorHandlerConfig::from(&config.resilience)
                .circuit_breaker
                .failure_threshold,
            2
        );
        assert_eq!(waypoint_batch::BatchConfig::from(&config.batch).max_batch_size, 3);
        assert_eq!(config.logging.level, LogLevel::Debug);
    });
}

#[test]
fn test_env_override_is_validated() {
    let file = yaml_file();
    with_vars(vec![("WAYPOINT_BATCH_MAX_SIZE", Some("0"))], || {
        assert!(ConfigLoader::new().from_file(file.path()).is_err());
    });
    with_vars(vec![("WAYPOINT_HTTP_TIMEOUT", Some("soon"))], || {
        assert!(ConfigLoader::new().from_env().is_err());
    });
}

#[test]
fn test_env_only_configuration_enables_sync() {
    with_vars(
        vec![
            ("WAYPOINT_HTTP_BASE_URL", Some("http://127.0.0.1:8080")),
            ("WAYPOINT_SYNC_WS_URL", Some("wss://realtime.careers.example/ws")),
        ],
        || {
            let config = ConfigLoader::new().load(None::<&str>).unwrap();
            assert_eq!(config.http.base_url, "http://127.0.0.1:8080");
            let sync = config.sync.expect("sync enabled by env");
            assert_eq!(sync.ws_url, "wss://realtime.careers.example/ws");
        },
    );
}
