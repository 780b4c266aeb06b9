//! Resilience patterns for Waypoint
//!
//! This crate provides backoff calculation, a clock-driven circuit breaker
//! state machine, a registry of named breakers, a retry executor, and the
//! [`ErrorHandler`] that combines them with fallbacks and a capped error
//! history.

pub mod backoff;
pub mod circuit_breaker;
pub mod error_handler;
pub mod history;
pub mod registry;
pub mod retry;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig, CircuitSnapshot, CircuitState,
};
pub use error_handler::{
    ErrorHandler, ErrorHandlerBuilder, ErrorHandlerConfig, ErrorReporter, ReportError,
    RetryOutcome,
};
pub use history::{ErrorHistory, ErrorStats, DEFAULT_HISTORY_CAPACITY};
pub use registry::BreakerRegistry;
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
