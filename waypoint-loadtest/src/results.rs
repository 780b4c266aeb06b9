//! Load test aggregation and reporting

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::target::TargetOutcome;

/// Aggregate results of one load test run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadTestResults {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_duration: Duration,
    pub average_response_time_ms: f64,
    pub min_response_time_ms: u64,
    pub max_response_time_ms: u64,
    pub p50_response_time_ms: u64,
    pub p95_response_time_ms: u64,
    pub p99_response_time_ms: u64,
    pub requests_per_second: f64,
    /// Percent of requests that failed
    pub error_rate: f64,
    pub endpoint_results: BTreeMap<String, EndpointResults>,
    pub status_code_distribution: BTreeMap<u16, u64>,
    /// Failure messages and how often each was seen
    pub errors: BTreeMap<String, u64>,
}

/// Per-endpoint slice of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointResults {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time_ms: f64,
    /// Percent of this endpoint's requests that failed
    pub error_rate: f64,
    /// Percent of all failures in the run that came from this endpoint
    pub failure_share: f64,
}

/// One ramp step of a stress test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressRound {
    pub rps: f64,
    pub results: LoadTestResults,
    pub broke: bool,
}

/// Probe run at half the breaking rate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryResults {
    pub rps: f64,
    pub results: LoadTestResults,
    pub recovered: bool,
}

/// Outcome of a stress test
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StressTestResults {
    pub rounds: Vec<StressRound>,
    /// First rate at which the target broke
    pub breaking_point_rps: Option<f64>,
    /// Latest recovery probe
    pub recovery: Option<RecoveryResults>,
    /// `stop()` was called before the ramp finished
    pub stopped: bool,
}

impl StressTestResults {
    pub fn recovered(&self) -> bool {
        self.recovery.as_ref().is_some_and(|r| r.recovered)
    }

    pub fn max_sustained_rps(&self) -> Option<f64> {
        self.rounds
            .iter()
            .filter(|round| !round.broke)
            .map(|round| round.rps)
            .fold(None, |best, rps| Some(best.map_or(rps, |b: f64| b.max(rps))))
    }
}

#[derive(Debug, Default)]
struct EndpointTally {
    total: u64,
    successful: u64,
    failed: u64,
    response_time_sum_ms: u64,
}

/// Concurrent request recorder shared by the virtual users of one run
#[derive(Debug, Default)]
pub(crate) struct LoadTestTracker {
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    response_times: Mutex<Vec<u64>>,
    endpoints: Mutex<BTreeMap<String, EndpointTally>>,
    status_codes: Mutex<BTreeMap<u16, u64>>,
    errors: Mutex<BTreeMap<String, u64>>,
}

impl LoadTestTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, endpoint: &str, response_time: Duration, outcome: &TargetOutcome) {
        let response_time_ms = response_time.as_millis() as u64;
        if outcome.success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        self.response_times.lock().push(response_time_ms);

        if let Some(status) = outcome.status_code {
            *self.status_codes.lock().entry(status).or_insert(0) += 1;
        }

        if let Some(error) = &outcome.error {
            *self.errors.lock().entry(error.clone()).or_insert(0) += 1;
        }

        let mut endpoints = self.endpoints.lock();
        let tally = endpoints.entry(endpoint.to_string()).or_default();
        tally.total += 1;
        tally.response_time_sum_ms += response_time_ms;
        if outcome.success {
            tally.successful += 1;
        } else {
            tally.failed += 1;
        }
    }

    pub(crate) fn calculate_results(&self, total_duration: Duration) -> LoadTestResults {
        let mut response_times = self.response_times.lock().clone();
        response_times.sort_unstable();

        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total = successful + failed;

        let mut results = LoadTestResults {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            total_duration,
            status_code_distribution: self.status_codes.lock().clone(),
            errors: self.errors.lock().clone(),
            ..Default::default()
        };

        if !response_times.is_empty() {
            let len = response_times.len();
            results.min_response_time_ms = response_times[0];
            results.max_response_time_ms = response_times[len - 1];
            results.average_response_time_ms =
                response_times.iter().sum::<u64>() as f64 / len as f64;
            results.p50_response_time_ms = percentile(&response_times, 50);
            results.p95_response_time_ms = percentile(&response_times, 95);
            results.p99_response_time_ms = percentile(&response_times, 99);
        }

        results.error_rate = percent(failed, total);

        let seconds = total_duration.as_secs_f64();
        if seconds > 0.0 {
            results.requests_per_second = total as f64 / seconds;
        }

        for (endpoint, tally) in self.endpoints.lock().iter() {
            let average = if tally.total > 0 {
                tally.response_time_sum_ms as f64 / tally.total as f64
            } else {
                0.0
            };
            results.endpoint_results.insert(
                endpoint.clone(),
                EndpointResults {
                    total_requests: tally.total,
                    successful_requests: tally.successful,
                    failed_requests: tally.failed,
                    average_response_time_ms: average,
                    error_rate: percent(tally.failed, tally.total),
                    failure_share: percent(tally.failed, failed),
                },
            );
        }

        results
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    let index = (sorted.len() * pct / 100).min(sorted.len() - 1);
    sorted[index]
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

impl fmt::Display for LoadTestResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Load test results")?;
        writeln!(f, "  Duration:        {:.2}s", self.total_duration.as_secs_f64())?;
        writeln!(
            f,
            "  Requests:        {} total, {} ok, {} failed",
            self.total_requests, self.successful_requests, self.failed_requests
        )?;
        writeln!(f, "  Error rate:      {:.2}%", self.error_rate)?;
        writeln!(f, "  Throughput:      {:.2} req/s", self.requests_per_second)?;
        writeln!(
            f,
            "  Response time:   avg {:.1}ms, min {}ms, max {}ms",
            self.average_response_time_ms, self.min_response_time_ms, self.max_response_time_ms
        )?;
        writeln!(
            f,
            "  Percentiles:     p50 {}ms, p95 {}ms, p99 {}ms",
            self.p50_response_time_ms, self.p95_response_time_ms, self.p99_response_time_ms
        )?;

        if !self.endpoint_results.is_empty() {
            writeln!(f, "  Endpoints:")?;
            for (endpoint, stats) in &self.endpoint_results {
                writeln!(
                    f,
                    "    {:<32} {:>6} req  {:>6} failed ({:.1}%, {:.1}% of failures)  avg {:.1}ms",
                    endpoint,
                    stats.total_requests,
                    stats.failed_requests,
                    stats.error_rate,
                    stats.failure_share,
                    stats.average_response_time_ms
                )?;
            }
        }

        if !self.status_code_distribution.is_empty() {
            let codes: Vec<String> = self
                .status_code_distribution
                .iter()
                .map(|(code, count)| format!("{}x{}", code, count))
                .collect();
            writeln!(f, "  Status codes:    {}", codes.join(", "))?;
        }

        if !self.errors.is_empty() {
            writeln!(f, "  Errors:")?;
            for (message, count) in &self.errors {
                writeln!(f, "    {:>6}  {}", count, message)?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for StressTestResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stress test results")?;
        for round in &self.rounds {
            writeln!(
                f,
                "  {:>8.1} rps  error {:>6.2}%  avg {:>8.1}ms  p95 {:>6}ms{}",
                round.rps,
                round.results.error_rate,
                round.results.average_response_time_ms,
                round.results.p95_response_time_ms,
                if round.broke { "  <- broke" } else { "" }
            )?;
        }

        match self.breaking_point_rps {
            Some(rps) => writeln!(f, "  Breaking point:  {:.1} rps", rps)?,
            None => writeln!(f, "  Breaking point:  not reached")?,
        }

        if let Some(recovery) = &self.recovery {
            writeln!(
                f,
                "  Recovery:        {} at {:.1} rps (error {:.2}%, avg {:.1}ms)",
                if recovery.recovered { "recovered" } else { "not recovered" },
                recovery.rps,
                recovery.results.error_rate,
                recovery.results.average_response_time_ms
            )?;
        }

        if self.stopped {
            writeln!(f, "  Stopped before the ramp completed")?;
        }

        Ok(())
    }
}
