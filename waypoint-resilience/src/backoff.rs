//! Backoff strategies for retry policies

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,

    /// Linear increase: delay = initial_delay * attempt
    Linear,

    /// Exponential increase: delay = initial_delay * base^(attempt-1)
    Exponential {
        /// Base for exponential calculation (e.g., 2.0 for doubling)
        base: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential { base: 2.0 }
    }
}

/// Backoff delay calculator
///
/// Jitter is applied before the cap, so no delay ever exceeds `max_delay`.
/// With an exponential base of at least `(1 + r) / (1 - r)` for jitter ratio
/// `r`, successive delays are non-decreasing even with jitter.
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    strategy: BackoffStrategy,
    initial_delay: Duration,
    max_delay: Duration,
    jitter_ratio: f64,
}

impl BackoffCalculator {
    pub fn new(
        strategy: BackoffStrategy,
        initial_delay: Duration,
        max_delay: Duration,
        jitter_ratio: f64,
    ) -> Self {
        Self {
            strategy,
            initial_delay,
            max_delay,
            jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
        }
    }

    /// Calculate the delay after a failed attempt (1-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.calculate_base_delay(attempt);
        let jittered = if self.jitter_ratio > 0.0 {
            self.add_jitter(base_delay)
        } else {
            base_delay
        };
        jittered.min(self.max_delay)
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    fn calculate_base_delay(&self, attempt: u32) -> Duration {
        match &self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,

            BackoffStrategy::Linear => self.initial_delay.saturating_mul(attempt),

            BackoffStrategy::Exponential { base } => {
                if attempt == 0 {
                    return Duration::ZERO;
                }
                let multiplier = base.powi(attempt as i32 - 1);
                duration_from_secs_saturating(self.initial_delay.as_secs_f64() * multiplier)
            }
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let factor =
            rng.gen_range((1.0 - self.jitter_ratio)..=(1.0 + self.jitter_ratio));
        duration_from_secs_saturating(delay.as_secs_f64() * factor)
    }
}

fn duration_from_secs_saturating(secs: f64) -> Duration {
    if !secs.is_finite() || secs >= Duration::MAX.as_secs_f64() {
        Duration::MAX
    } else {
        Duration::from_secs_f64(secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Fixed,
            Duration::from_millis(100),
            Duration::from_secs(1),
            0.0,
        );

        assert_eq!(calc.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(calc.calculate_delay(10), Duration::from_millis(100));
    }

    #[test]
    fn test_linear_backoff() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Linear,
            Duration::from_millis(100),
            Duration::from_secs(1),
            0.0,
        );

        assert_eq!(calc.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(calc.calculate_delay(20), Duration::from_secs(1)); // Capped at max
    }

    #[test]
    fn test_exponential_doubles_from_base() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Exponential { base: 2.0 },
            Duration::from_secs(1),
            Duration::from_secs(30),
            0.0,
        );

        assert_eq!(calc.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(calc.calculate_delay(2), Duration::from_secs(2));
        assert_eq!(calc.calculate_delay(3), Duration::from_secs(4));
        assert_eq!(calc.calculate_delay(6), Duration::from_secs(30)); // Capped
        assert_eq!(calc.calculate_delay(200), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_ratio() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Fixed,
            Duration::from_millis(1000),
            Duration::from_secs(10),
            0.1,
        );

        for _ in 0..100 {
            let delay = calc.calculate_delay(1);
            assert!(delay >= Duration::from_millis(900));
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[test]
    fn test_jittered_exponential_is_monotone_and_bounded() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Exponential { base: 2.0 },
            Duration::from_millis(1000),
            Duration::from_secs(30),
            0.1,
        );

        for _ in 0..50 {
            let delays: Vec<Duration> = (1..=12).map(|a| calc.calculate_delay(a)).collect();
            for pair in delays.windows(2) {
                assert!(pair[0] <= pair[1], "backoff decreased: {:?}", delays);
            }
            assert!(delays.iter().all(|d| *d <= Duration::from_secs(30)));
        }
    }
}
