//! Domain-driven configuration management for Waypoint
//!
//! Configuration is split by functional domain (HTTP client, cache,
//! resilience, batching, load testing, realtime sync, logging), each with
//! serde defaults, validation, and `WAYPOINT_*` environment overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    batch::BatchConfig,
    cache::CacheConfig,
    http::HttpConfig,
    load_test::{LoadTestConfig, StressTestConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    resilience::{ReportingConfig, ResilienceConfig},
    sync::SyncConfig,
    WaypointConfig,
};

// Re-export utilities
pub use domains::utils::{serde_duration, serde_duration_ms};
