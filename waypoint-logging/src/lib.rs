//! Logging infrastructure for Waypoint
//!
//! This crate provides:
//! - `tracing-subscriber` initialisation driven by [`waypoint_config::LoggingConfig`]
//! - The error taxonomy shared by the resilience and HTTP layers
//! - [`ErrorInfo`], the record kept in error histories and sent to reporters

pub mod error_info;
pub mod init;
pub mod severity;

pub use error_info::{classify, ErrorInfo, ErrorType};
pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use severity::ErrorSeverity;
