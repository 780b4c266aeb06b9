//! Named circuit breakers
//!
//! A breaker is created lazily on first use of a name and is a singleton for
//! that name for the lifetime of the registry.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use waypoint_core::{SharedClock, SystemClock};

pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    clock: SharedClock,
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default(), SystemClock::shared())
    }

    /// Get the breaker for `name`, creating it on first use
    pub fn get_or_create(&self, name: &str) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("Creating circuit breaker '{}'", name);
                CircuitBreaker::new(name, self.config.clone(), self.clock.clone())
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.read().get(name).cloned()
    }

    /// Whether the named circuit currently rejects requests.
    /// Unknown names are closed.
    pub fn is_open(&self, name: &str) -> bool {
        self.get(name).map(|b| b.is_open()).unwrap_or(false)
    }

    pub fn snapshot(&self, name: &str) -> Option<CircuitSnapshot> {
        self.get(name).map(|b| b.snapshot())
    }

    /// Snapshots of every known breaker, sorted by name
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.read().values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Reset the named breaker; returns false if it does not exist
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}
