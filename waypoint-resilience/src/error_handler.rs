//! Retry/fallback registry keyed by operation context
//!
//! [`ErrorHandler::execute_with_retry`] never returns an `Err`: every path ends
//! in a [`RetryOutcome`] the caller inspects.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use waypoint_config::ResilienceConfig;
use waypoint_core::{RequestContext, SharedClock, SystemClock};
use waypoint_logging::ErrorInfo;

use crate::backoff::{BackoffCalculator, BackoffStrategy};
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitSnapshot};
use crate::history::{ErrorHistory, ErrorStats};
use crate::registry::BreakerRegistry;
use crate::retry::Retryable;

/// Destination for classified errors
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, error: &ErrorInfo) -> Result<(), ReportError>;
}

#[derive(Debug, thiserror::Error)]
#[error("Error report failed: {0}")]
pub struct ReportError(pub String);

type Fallback = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Runtime configuration for [`ErrorHandler`]
#[derive(Debug, Clone)]
pub struct ErrorHandlerConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub jitter_ratio: f64,
    pub circuit_breaker: CircuitBreakerConfig,
    pub graceful_degradation: bool,
    pub reporting_enabled: bool,
    pub history_capacity: usize,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for ErrorHandlerConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay_ms,
            max_retry_delay: config.max_retry_delay_ms,
            jitter_ratio: config.jitter_ratio,
            circuit_breaker: CircuitBreakerConfig::from(config),
            graceful_degradation: config.graceful_degradation,
            reporting_enabled: config.reporting.enabled,
            history_capacity: config.history_capacity,
        }
    }
}

impl ErrorHandlerConfig {
    fn backoff(&self) -> BackoffCalculator {
        BackoffCalculator::new(
            BackoffStrategy::Exponential { base: 2.0 },
            self.retry_delay,
            self.max_retry_delay,
            self.jitter_ratio,
        )
    }
}

/// Result of [`ErrorHandler::execute_with_retry`]
#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Index of the succeeding attempt, or the attempts made on failure.
    /// Equal to `max_retries` when a fallback produced the data.
    pub retry_count: u32,
    pub total_time: Duration,
    pub fallback_used: bool,
}

impl<T> RetryOutcome<T> {
    fn failure(error: String, retry_count: u32, total_time: Duration) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            retry_count,
            total_time,
            fallback_used: false,
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error) {
            (Some(data), _) if self.success => Ok(data),
            (_, Some(error)) => Err(error),
            _ => Err("operation produced no data".to_string()),
        }
    }
}

/// How the retry loop ended
enum LoopEnd<T> {
    /// Succeeded, or never ran because the circuit was open
    Finished(RetryOutcome<T>),
    /// Every attempt failed; a fallback may still apply
    Exhausted { last_error: String, attempts: u32 },
}

pub struct ErrorHandler {
    config: ErrorHandlerConfig,
    registry: Arc<BreakerRegistry>,
    history: Arc<ErrorHistory>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    fallbacks: RwLock<HashMap<String, Fallback>>,
    clock: SharedClock,
    request_context: RequestContext,
}

impl ErrorHandler {
    pub fn new(config: ErrorHandlerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ErrorHandlerConfig) -> ErrorHandlerBuilder {
        ErrorHandlerBuilder::new(config)
    }

    pub fn config(&self) -> &ErrorHandlerConfig {
        &self.config
    }

    /// Run `operation` with retries, circuit breaking and fallback.
    ///
    /// `context` names both the circuit breaker and the fallback. Without a
    /// context no breaker or fallback applies. `custom_config` overrides the
    /// retry and degradation settings for this call only; breaker thresholds
    /// always come from the registry. Fallback data arrives as JSON, hence the
    /// `DeserializeOwned` bound; see [`Self::execute_without_fallback`].
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        context: Option<&str>,
        custom_config: Option<&ErrorHandlerConfig>,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
        T: DeserializeOwned,
    {
        let config = custom_config.unwrap_or(&self.config);
        let start = Instant::now();

        let (last_error, attempts) = match self.retry_loop(operation, context, config, start).await {
            LoopEnd::Finished(outcome) => return outcome,
            LoopEnd::Exhausted { last_error, attempts } => (last_error, attempts),
        };

        if config.graceful_degradation {
            if let Some(name) = context {
                if let Some(data) = self.run_fallback::<T>(name).await {
                    return RetryOutcome {
                        success: true,
                        data: Some(data),
                        error: None,
                        retry_count: config.max_retries.max(1),
                        total_time: start.elapsed(),
                        fallback_used: true,
                    };
                }
            }
        }

        RetryOutcome::failure(last_error, attempts, start.elapsed())
    }

    /// Same as [`Self::execute_with_retry`] but never consults a fallback,
    /// so `T` may be any type.
    pub async fn execute_without_fallback<T, E, F, Fut>(
        &self,
        operation: F,
        context: Option<&str>,
        custom_config: Option<&ErrorHandlerConfig>,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let config = custom_config.unwrap_or(&self.config);
        let start = Instant::now();

        match self.retry_loop(operation, context, config, start).await {
            LoopEnd::Finished(outcome) => outcome,
            LoopEnd::Exhausted { last_error, attempts } => {
                RetryOutcome::failure(last_error, attempts, start.elapsed())
            }
        }
    }

    async fn retry_loop<T, E, F, Fut>(
        &self,
        mut operation: F,
        context: Option<&str>,
        config: &ErrorHandlerConfig,
        start: Instant,
    ) -> LoopEnd<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let breaker = context.map(|name| self.registry.get_or_create(name));

        if let Some(ref breaker) = breaker {
            if !breaker.allow_request() {
                log::warn!("Circuit breaker open for '{}', skipping call", breaker.name());
                return LoopEnd::Finished(RetryOutcome::failure(
                    format!("Circuit breaker open for '{}'", breaker.name()),
                    0,
                    start.elapsed(),
                ));
            }
        }

        let max_retries = config.max_retries.max(1);
        let backoff = config.backoff();
        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 0..max_retries {
            attempts = attempt + 1;

            match operation().await {
                Ok(data) => {
                    if let Some(ref breaker) = breaker {
                        breaker.record_success();
                    }
                    return LoopEnd::Finished(RetryOutcome {
                        success: true,
                        data: Some(data),
                        error: None,
                        retry_count: attempt,
                        total_time: start.elapsed(),
                        fallback_used: false,
                    });
                }
                Err(error) => {
                    last_error = error.to_string();
                    let mut info = ErrorInfo::classified(last_error.clone(), error.status_code())
                        .with_retry_count(attempt)
                        .with_timestamp(self.clock.utc_now())
                        .with_context(self.request_context.clone());
                    if let Some(name) = context {
                        info = info.with_endpoint(name);
                    }
                    self.record_error(info, config).await;

                    if !error.is_retryable() {
                        log::warn!("Non-retryable error, giving up: {}", last_error);
                        break;
                    }

                    if attempt + 1 < max_retries {
                        let delay = backoff.calculate_delay(attempt + 1);
                        log::warn!(
                            "Attempt {} of {} failed: {}. Retrying in {:?}",
                            attempt + 1,
                            max_retries,
                            last_error,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        if let Some(ref breaker) = breaker {
            breaker.record_failure();
        }

        LoopEnd::Exhausted { last_error, attempts }
    }

    async fn run_fallback<T: DeserializeOwned>(&self, context: &str) -> Option<T> {
        let fallback = self.fallbacks.read().get(context).cloned()?;

        match fallback().await {
            Ok(value) => match serde_json::from_value(value) {
                Ok(data) => {
                    log::info!("Fallback for '{}' served degraded result", context);
                    Some(data)
                }
                Err(e) => {
                    log::warn!("Fallback for '{}' returned incompatible data: {}", context, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Fallback for '{}' failed: {}", context, e);
                None
            }
        }
    }

    async fn record_error(&self, info: ErrorInfo, config: &ErrorHandlerConfig) {
        if info.severity.should_alert() {
            log::error!("{} error: {}", info.severity, info.message);
        }
        if config.reporting_enabled {
            if let Some(ref reporter) = self.reporter {
                if let Err(e) = reporter.report(&info).await {
                    log::warn!("{}", e);
                }
            }
        }
        self.history.record(info);
    }

    /// Register a fallback producing JSON for `context`
    pub fn register_fallback<F, Fut>(&self, context: impl Into<String>, fallback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let boxed: Fallback = Arc::new(move || fallback().boxed());
        self.fallbacks.write().insert(context.into(), boxed);
    }

    pub fn remove_fallback(&self, context: &str) -> bool {
        self.fallbacks.write().remove(context).is_some()
    }

    pub fn circuit_state(&self, context: &str) -> Option<CircuitSnapshot> {
        self.registry.snapshot(context)
    }

    pub fn reset_circuit(&self, context: &str) -> bool {
        self.registry.reset(context)
    }

    pub fn error_history(&self) -> Vec<ErrorInfo> {
        self.history.entries()
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.history.stats()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<ErrorHistory> {
        &self.history
    }
}

/// Builder for [`ErrorHandler`]; unset components are created fresh
pub struct ErrorHandlerBuilder {
    config: ErrorHandlerConfig,
    registry: Option<Arc<BreakerRegistry>>,
    history: Option<Arc<ErrorHistory>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    clock: Option<SharedClock>,
    request_context: RequestContext,
}

impl ErrorHandlerBuilder {
    pub fn new(config: ErrorHandlerConfig) -> Self {
        Self {
            config,
            registry: None,
            history: None,
            reporter: None,
            clock: None,
            request_context: RequestContext::default(),
        }
    }

    pub fn registry(mut self, registry: Arc<BreakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn history(mut self, history: Arc<ErrorHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn request_context(mut self, context: RequestContext) -> Self {
        self.request_context = context;
        self
    }

    pub fn build(self) -> ErrorHandler {
        let clock = self.clock.unwrap_or_else(SystemClock::shared);
        let registry = self.registry.unwrap_or_else(|| {
            Arc::new(BreakerRegistry::new(
                self.config.circuit_breaker.clone(),
                clock.clone(),
            ))
        });
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(ErrorHistory::new(self.config.history_capacity)));

        ErrorHandler {
            config: self.config,
            registry,
            history,
            reporter: self.reporter,
            fallbacks: RwLock::new(HashMap::new()),
            clock,
            request_context: self.request_context,
        }
    }
}
