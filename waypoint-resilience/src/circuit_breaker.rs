//! Circuit breaker state machine
//!
//! `Closed → Open → HalfOpen → Closed`, with the open-to-half-open transition
//! driven by an injected [`Clock`](waypoint_core::Clock) rather than wall time.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use waypoint_config::ResilienceConfig;
use waypoint_core::{SharedClock, SystemClock};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests are blocked
    Open,
    /// Timeout elapsed; the next request is let through as a probe
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Successes in half-open state before closing
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Time to wait before transitioning from open to half-open
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_success_threshold() -> u32 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: default_success_threshold(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&ResilienceConfig> for CircuitBreakerConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            failure_threshold: config.circuit_breaker_threshold,
            success_threshold: default_success_threshold(),
            timeout: config.circuit_breaker_timeout,
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    /// Consecutive failures since the last success or reset
    pub failure_count: u32,
    pub success_count: u64,
    pub total_requests: u64,
    pub total_rejected: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// When an open circuit will let the next probe through
    pub next_attempt_time: Option<DateTime<Utc>>,
}

impl CircuitSnapshot {
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }
}

/// Thread-safe circuit breaker; clones share state
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    clock: SharedClock,
    state: Arc<Mutex<BreakerState>>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    total_successes: u64,
    total_requests: u64,
    total_rejected: u64,
    opened_at: Option<Instant>,
    opened_at_wall: Option<DateTime<Utc>>,
    last_failure_wall: Option<DateTime<Utc>>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            total_successes: 0,
            total_requests: 0,
            total_rejected: 0,
            opened_at: None,
            opened_at_wall: None,
            last_failure_wall: None,
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            config: Arc::new(config),
            clock,
            state: Arc::new(Mutex::new(BreakerState::new())),
        }
    }

    /// Create with default configuration and the system clock
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default(), SystemClock::shared())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether the circuit currently blocks requests
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Get the current state, applying any timer-driven transition first
    pub fn state(&self) -> CircuitState {
        let mut state = self.state.lock();
        self.update_state(&mut state);
        state.state
    }

    /// Gate a request. Counts a rejection when the circuit is open.
    pub fn allow_request(&self) -> bool {
        let mut state = self.state.lock();
        self.update_state(&mut state);

        if state.state == CircuitState::Open {
            state.total_rejected += 1;
            false
        } else {
            true
        }
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        self.update_state(&mut state);

        state.total_requests += 1;
        state.total_successes += 1;

        match state.state {
            CircuitState::HalfOpen => {
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.success_threshold {
                    self.transition_to_closed(&mut state);
                }
            }
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late
            }
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        self.update_state(&mut state);

        state.total_requests += 1;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure_wall = Some(self.clock.utc_now());

        match state.state {
            CircuitState::Closed => {
                if state.consecutive_failures >= self.config.failure_threshold {
                    self.transition_to_open(&mut state);
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to_open(&mut state);
            }
            CircuitState::Open => {}
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = BreakerState::new();
        log::info!("Circuit breaker '{}' reset", self.name);
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let mut state = self.state.lock();
        self.update_state(&mut state);

        let next_attempt_time = match state.state {
            CircuitState::Open => state.opened_at_wall.and_then(|opened| {
                chrono::Duration::from_std(self.config.timeout)
                    .ok()
                    .map(|timeout| opened + timeout)
            }),
            _ => None,
        };

        CircuitSnapshot {
            name: self.name.to_string(),
            state: state.state,
            failure_count: state.consecutive_failures,
            success_count: state.total_successes,
            total_requests: state.total_requests,
            total_rejected: state.total_rejected,
            last_failure_time: state.last_failure_wall,
            next_attempt_time,
        }
    }

    fn update_state(&self, state: &mut BreakerState) {
        if state.state != CircuitState::Open {
            return;
        }
        if let Some(opened_at) = state.opened_at {
            if self.clock.now().saturating_duration_since(opened_at) >= self.config.timeout {
                self.transition_to_half_open(state);
            }
        }
    }

    fn transition_to_open(&self, state: &mut BreakerState) {
        state.state = CircuitState::Open;
        state.half_open_successes = 0;
        state.opened_at = Some(self.clock.now());
        state.opened_at_wall = Some(self.clock.utc_now());
        log::warn!(
            "Circuit breaker '{}' opened after {} consecutive failures",
            self.name,
            state.consecutive_failures
        );
    }

    fn transition_to_closed(&self, state: &mut BreakerState) {
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.half_open_successes = 0;
        state.opened_at = None;
        state.opened_at_wall = None;
        log::info!("Circuit breaker '{}' closed after successful recovery", self.name);
    }

    fn transition_to_half_open(&self, state: &mut BreakerState) {
        state.state = CircuitState::HalfOpen;
        state.half_open_successes = 0;
        log::info!("Circuit breaker '{}' transitioned to half-open state", self.name);
    }
}

/// Builder for circuit breakers
pub struct CircuitBreakerBuilder {
    name: String,
    config: CircuitBreakerConfig,
    clock: Option<SharedClock>,
}

impl CircuitBreakerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
            clock: None,
        }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> CircuitBreaker {
        let clock = self.clock.unwrap_or_else(SystemClock::shared);
        CircuitBreaker::new(self.name, self.config, clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::MockClock;

    fn breaker(clock: &MockClock, threshold: u32) -> CircuitBreaker {
        CircuitBreakerBuilder::new("GET /api/v1/subjects")
            .failure_threshold(threshold)
            .timeout(Duration::from_secs(60))
            .clock(clock.shared())
            .build()
    }

    #[test]
    fn test_circuit_breaker_basic_flow() {
        let clock = MockClock::new();
        let breaker = breaker(&clock, 3);

        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());

        clock.advance(Duration::from_secs(59));
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(1));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.allow_request());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failure_count, 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let clock = MockClock::new();
        let breaker = breaker(&clock, 2);

        breaker.record_failure();
        breaker.record_failure();
        clock.advance(Duration::from_secs(61));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // The open period restarts from the probe failure
        clock.advance(Duration::from_secs(30));
        assert!(breaker.is_open());
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let clock = MockClock::new();
        let breaker = breaker(&clock, 3);

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_snapshot_reports_counts_and_next_attempt() {
        let clock = MockClock::new();
        let breaker = breaker(&clock, 1);

        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.allow_request());

        let snapshot = breaker.snapshot();
        assert!(snapshot.is_open());
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.success_count, 1);
        assert_eq!(snapshot.total_rejected, 1);
        let last_failure = snapshot.last_failure_time.unwrap();
        assert_eq!(
            snapshot.next_attempt_time.unwrap() - last_failure,
            chrono::Duration::seconds(60)
        );
    }

    #[test]
    fn test_clones_share_state() {
        let clock = MockClock::new();
        let breaker = breaker(&clock, 1);
        let other = breaker.clone();

        other.record_failure();
        assert!(breaker.is_open());

        breaker.reset();
        assert_eq!(other.state(), CircuitState::Closed);
    }
}
