//! Virtual user driver and stress ramp

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::{LoadTestConfig, StressTestConfig};
use crate::results::{LoadTestResults, LoadTestTracker, RecoveryResults, StressRound, StressTestResults};
use crate::target::LoadTarget;

/// Drives a [`LoadTarget`] with paced virtual users
///
/// Clones share the active flag, so any clone can `stop()` a running test.
#[derive(Clone)]
pub struct LoadTester {
    target: Arc<dyn LoadTarget>,
    active: Arc<AtomicBool>,
}

impl std::fmt::Debug for LoadTester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTester")
            .field("active", &self.is_running())
            .finish()
    }
}

impl LoadTester {
    pub fn new(target: Arc<dyn LoadTarget>) -> Self {
        Self {
            target,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Ask every virtual user to stop after its current request
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("Load test stop requested");
        }
    }

    /// Run `concurrent_users` users, each issuing `requests_per_user` requests.
    ///
    /// Failures are counted, never returned; a stopped run reports whatever
    /// completed before the stop.
    pub async fn run_load_test(&self, config: &LoadTestConfig) -> LoadTestResults {
        self.active.store(true, Ordering::SeqCst);
        let results = self.run_round(config).await;
        self.active.store(false, Ordering::SeqCst);
        results
    }

    /// Ramp the request rate until the target breaks, then probe recovery.
    ///
    /// Each round multiplies the rate by `rps_factor`. A round breaks when its
    /// error rate or mean latency exceeds the breaking thresholds. After a
    /// break the driver waits `recovery_wait` and reruns at half the rate; a
    /// confirmed recovery ends the test, otherwise the ramp continues until
    /// the rate passes `max_rps`.
    pub async fn run_stress_test(&self, config: &LoadTestConfig) -> StressTestResults {
        let stress = &config.stress;
        let mut outcome = StressTestResults::default();
        let mut rps = stress.initial_rps;

        self.active.store(true, Ordering::SeqCst);
        info!(
            "Starting stress test at {:.1} rps (x{} per round, max {:.1})",
            rps, stress.rps_factor, stress.max_rps
        );

        while rps <= stress.max_rps {
            if !self.is_running() {
                outcome.stopped = true;
                break;
            }

            let results = self.run_round(&config.clone().with_target_rps(rps)).await;
            let broke = is_breaking(stress, &results);
            debug!(
                "Stress round at {:.1} rps: error {:.2}%, avg {:.1}ms",
                rps, results.error_rate, results.average_response_time_ms
            );
            outcome.rounds.push(StressRound { rps, results, broke });

            if broke {
                if outcome.breaking_point_rps.is_none() {
                    warn!("Breaking point reached at {:.1} rps", rps);
                    outcome.breaking_point_rps = Some(rps);
                }

                sleep(stress.recovery_wait).await;
                if !self.is_running() {
                    outcome.stopped = true;
                    break;
                }

                let recovery_rps = rps / 2.0;
                let results = self
                    .run_round(&config.clone().with_target_rps(recovery_rps))
                    .await;
                let recovered = is_recovered(stress, &results);
                outcome.recovery = Some(RecoveryResults {
                    rps: recovery_rps,
                    results,
                    recovered,
                });

                if recovered {
                    info!("Recovered at {:.1} rps", recovery_rps);
                    break;
                }
                warn!("No recovery at {:.1} rps; continuing ramp", recovery_rps);
            }

            rps *= stress.rps_factor;
        }

        self.active.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_round(&self, config: &LoadTestConfig) -> LoadTestResults {
        let tracker = Arc::new(LoadTestTracker::new());
        let endpoints: Arc<[String]> = config.endpoints.clone().into();
        let interval = config.request_interval();
        let users = config.concurrent_users;
        let requests_per_user = config.requests_per_user;

        info!(
            "Load run: {} users x {} requests at {:.1} rps over {} endpoint(s)",
            users,
            requests_per_user,
            config.target_rps,
            endpoints.len()
        );

        let start_time = Instant::now();
        let mut handles = Vec::with_capacity(users);

        for user in 0..users {
            let target = self.target.clone();
            let active = self.active.clone();
            let tracker = tracker.clone();
            let endpoints = endpoints.clone();

            handles.push(tokio::spawn(async move {
                if endpoints.is_empty() {
                    return;
                }

                // Stagger users across one interval so the aggregate rate is even
                let offset = interval.mul_f64(user as f64 / users as f64);
                if !offset.is_zero() {
                    sleep(offset).await;
                }

                for request in 0..requests_per_user {
                    if !active.load(Ordering::SeqCst) {
                        break;
                    }
                    if request > 0 && !interval.is_zero() {
                        sleep(interval).await;
                        if !active.load(Ordering::SeqCst) {
                            break;
                        }
                    }

                    let endpoint = &endpoints[(user + request) % endpoints.len()];
                    let request_start = Instant::now();
                    let outcome = target.hit(endpoint).await;
                    tracker.record(endpoint, request_start.elapsed(), &outcome);
                }
            }));
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!("Virtual user task ended abnormally: {}", e);
            }
        }

        let results = tracker.calculate_results(start_time.elapsed());
        info!(
            "Load run finished: {} requests, {:.2}% errors, {:.1} rps",
            results.total_requests, results.error_rate, results.requests_per_second
        );
        results
    }
}

fn is_breaking(stress: &StressTestConfig, results: &LoadTestResults) -> bool {
    results.error_rate > stress.breaking_error_rate
        || results.average_response_time_ms > stress.breaking_response_time.as_millis() as f64
}

fn is_recovered(stress: &StressTestConfig, results: &LoadTestResults) -> bool {
    results.error_rate < stress.recovery_error_rate
        && results.average_response_time_ms < stress.recovery_response_time.as_millis() as f64
}
