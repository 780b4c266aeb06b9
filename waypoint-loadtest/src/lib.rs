//! Load and stress test driver
//!
//! [`LoadTester`] drives a [`LoadTarget`] with a number of paced virtual
//! users and aggregates latency percentiles, throughput and per-endpoint
//! failure rates. The stress test ramps the request rate until the target
//! breaks, then probes recovery at half that rate.

pub mod config;
pub mod results;
pub mod target;
pub mod tester;

pub use config::{LoadTestConfig, StressTestConfig};
pub use results::{EndpointResults, LoadTestResults, RecoveryResults, StressRound, StressTestResults};
pub use target::{LoadTarget, TargetOutcome};
pub use tester::LoadTester;
