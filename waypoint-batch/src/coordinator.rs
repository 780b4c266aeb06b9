//! Batch coordinator
//!
//! Operations are enqueued synchronously and dispatched in batches on
//! background tasks. At most `max_concurrent_batches` batches run at once;
//! each takes up to `max_batch_size` ready operations in priority order.
//! Every operation ends with exactly one [`OperationResult`].

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use waypoint_core::{Priority, SharedClock, SystemClock};
use waypoint_http::HttpMethod;
use waypoint_resilience::{BreakerRegistry, CircuitBreaker};

use crate::config::BatchConfig;
use crate::errors::{BatchError, BatchResult};
use crate::executor::OperationExecutor;
use crate::operation::{default_operation_name, Operation, OperationRequest, OperationResult};
use crate::queue::OperationQueue;

/// Point-in-time coordinator counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub queued: usize,
    pub in_flight: usize,
    pub active_batches: usize,
    pub batches_dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Results currently retained
    pub results: usize,
}

#[derive(Default)]
struct State {
    queue: OperationQueue,
    /// Operation id to the batch currently running it
    in_flight: HashMap<String, u64>,
    results: HashMap<String, OperationResult>,
    active_batches: usize,
    batches_dispatched: u64,
    succeeded: u64,
    failed: u64,
}

impl State {
    /// Drop the in-flight entry for `id` if `batch_no` still owns it
    fn release(&mut self, id: &str, batch_no: u64) {
        if self.in_flight.get(id) == Some(&batch_no) {
            self.in_flight.remove(id);
        }
    }

    fn runs_elsewhere(&self, id: &str, batch_no: u64) -> bool {
        self.in_flight.get(id).is_some_and(|owner| *owner != batch_no)
    }
}

struct Inner {
    config: BatchConfig,
    executor: Arc<dyn OperationExecutor>,
    breakers: Arc<BreakerRegistry>,
    clock: SharedClock,
    state: Mutex<State>,
    slots: Arc<Semaphore>,
    sequence: AtomicU64,
    pump_scheduled: AtomicBool,
    debounce_armed: AtomicBool,
}

/// Cheap to clone; clones share the same queue and results
#[derive(Clone)]
pub struct BatchCoordinator {
    inner: Arc<Inner>,
}

impl BatchCoordinator {
    pub fn new(config: BatchConfig, executor: Arc<dyn OperationExecutor>) -> BatchResult<Self> {
        Self::builder(executor).config(config).build()
    }

    pub fn builder(executor: Arc<dyn OperationExecutor>) -> BatchCoordinatorBuilder {
        BatchCoordinatorBuilder::new(executor)
    }

    pub fn config(&self) -> &BatchConfig {
        &self.inner.config
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.inner.breakers
    }

    /// Enqueue an operation and return its id.
    ///
    /// Must be called from within a Tokio runtime; dispatch happens on a
    /// spawned task.
    pub fn add_operation(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        data: Option<Value>,
        priority: Option<Priority>,
        dependencies: Option<Vec<String>>,
    ) -> BatchResult<String> {
        self.add(OperationRequest {
            method,
            url: url.into(),
            data,
            priority: priority.unwrap_or_default(),
            dependencies: dependencies.unwrap_or_default(),
            name: None,
        })
    }

    pub fn add(&self, request: OperationRequest) -> BatchResult<String> {
        if request.url.trim().is_empty() {
            return Err(BatchError::InvalidOperation("url must not be empty".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let name = request
            .name
            .unwrap_or_else(|| default_operation_name(request.method, &request.url));
        let operation = Operation {
            id: id.clone(),
            method: request.method,
            url: request.url,
            data: request.data,
            priority: request.priority,
            retry_count: 0,
            enqueued_at: self.inner.clock.utc_now(),
            dependencies: request.dependencies,
            name,
            sequence: self.inner.sequence.fetch_add(1, Ordering::Relaxed),
        };

        debug!(
            "Queued {} {} as {} ({} priority)",
            operation.method, operation.url, id, operation.priority
        );
        self.inner.state.lock().queue.push(operation);
        self.inner.schedule_pump();

        Ok(id)
    }

    pub fn get_result(&self, id: &str) -> Option<OperationResult> {
        self.inner.state.lock().results.get(id).cloned()
    }

    /// Poll every `poll_interval` until a result for `id` exists
    pub async fn wait_for_result(&self, id: &str, timeout: Duration) -> BatchResult<OperationResult> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = self.get_result(id) {
                return Ok(result);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(BatchError::Timeout {
                    id: id.to_string(),
                    waited: timeout,
                });
            }
            sleep(self.inner.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// Forget all recorded results
    pub fn clear_results(&self) {
        let mut state = self.inner.state.lock();
        let cleared = state.results.len();
        state.results.clear();
        debug!("Cleared {} operation results", cleared);
    }

    pub fn stats(&self) -> BatchStats {
        let state = self.inner.state.lock();
        BatchStats {
            queued: state.queue.len(),
            in_flight: state.in_flight.len(),
            active_batches: state.active_batches,
            batches_dispatched: state.batches_dispatched,
            succeeded: state.succeeded,
            failed: state.failed,
            results: state.results.len(),
        }
    }

    /// Dispatch everything queued and wait until no batch is running
    pub async fn flush(&self) {
        loop {
            self.inner.pump();
            {
                let state = self.inner.state.lock();
                if state.queue.is_empty() && state.in_flight.is_empty() && state.active_batches == 0
                {
                    return;
                }
            }
            sleep(self.inner.config.poll_interval).await;
        }
    }
}

impl Inner {
    fn schedule_pump(self: &Arc<Self>) {
        if self.pump_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.pump_scheduled.store(false, Ordering::Release);
            inner.pump();
        });
    }

    /// Start batches while slots are free and ready work exists
    fn pump(self: &Arc<Self>) {
        loop {
            let permit = match Arc::clone(&self.slots).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    self.arm_debounce();
                    return;
                }
            };

            let (batch, batch_no) = {
                let mut guard = self.state.lock();
                let state = &mut *guard;
                let batch = state
                    .queue
                    .take_batch(self.config.max_batch_size, &state.in_flight);
                if batch.is_empty() {
                    return;
                }
                state.active_batches += 1;
                state.batches_dispatched += 1;
                let batch_no = state.batches_dispatched;
                for op in &batch {
                    state.in_flight.insert(op.id.clone(), batch_no);
                }
                (batch, batch_no)
            };

            debug!("Dispatching batch {} with {} operations", batch_no, batch.len());
            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.run_batch(batch, batch_no, permit).await });
        }
    }

    /// Retry dispatch after `batch_timeout` when every slot was busy
    fn arm_debounce(self: &Arc<Self>) {
        if self.state.lock().queue.is_empty() || self.debounce_armed.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            sleep(inner.config.batch_timeout).await;
            inner.debounce_armed.store(false, Ordering::Release);
            inner.pump();
        });
    }

    async fn run_batch(
        self: Arc<Self>,
        batch: Vec<Operation>,
        batch_no: u64,
        permit: OwnedSemaphorePermit,
    ) {
        let members: Vec<(String, u32)> = batch
            .iter()
            .map(|op| (op.id.clone(), op.retry_count))
            .collect();

        let worker = Arc::clone(&self);
        let outcome = tokio::spawn(async move { worker.execute_batch(batch, batch_no).await }).await;

        {
            let mut state = self.state.lock();
            if let Err(e) = outcome {
                error!("Batch {} aborted: {}", batch_no, e);
                let message = format!("Batch execution failed: {}", e);
                for (id, retry_count) in &members {
                    if state.results.contains_key(id)
                        || state.queue.contains(id)
                        || state.runs_elsewhere(id, batch_no)
                    {
                        continue;
                    }
                    state.results.insert(
                        id.clone(),
                        OperationResult {
                            success: false,
                            data: None,
                            error: Some(message.clone()),
                            response_time: Duration::ZERO,
                            completed_at: self.clock.utc_now(),
                            retry_count: *retry_count,
                            batch: batch_no,
                        },
                    );
                    state.failed += 1;
                }
            }
            // Requeued members may already be running in a later batch
            for (id, _) in &members {
                state.release(id, batch_no);
            }
            state.active_batches -= 1;
        }

        drop(permit);
        self.pump();
    }

    async fn execute_batch(&self, batch: Vec<Operation>, batch_no: u64) {
        let mut gets = Vec::new();
        let mut individual = Vec::new();

        for op in batch {
            let breaker = self.breakers.get_or_create(&op.name);
            if !breaker.allow_request() {
                let error = format!("Circuit breaker open for '{}'", op.name);
                self.store(&op, Err(error), Duration::ZERO, batch_no);
                continue;
            }
            if op.is_get() {
                gets.push((op, breaker));
            } else {
                individual.push((op, breaker));
            }
        }

        if self.config.coalesce_gets && gets.len() >= 2 {
            let urls: Vec<String> = gets.iter().map(|(op, _)| op.url.clone()).collect();
            let started = Instant::now();
            match self.executor.execute_many(&urls).await {
                Ok(results) if results.len() == gets.len() => {
                    let elapsed = started.elapsed();
                    for ((op, breaker), outcome) in gets.drain(..).zip(results) {
                        self.complete(op, outcome, elapsed, batch_no, &breaker);
                    }
                }
                Ok(results) => warn!(
                    "Coalesced GET returned {} results for {} urls; falling back to individual requests",
                    results.len(),
                    urls.len()
                ),
                Err(e) => warn!(
                    "Coalesced GET of {} urls failed ({}); falling back to individual requests",
                    urls.len(),
                    e
                ),
            }
        }

        let mut pending = gets;
        pending.extend(individual);

        let this = self;
        futures::future::join_all(pending.into_iter().map(|(op, breaker)| async move {
            let started = Instant::now();
            let outcome = this.executor.execute(&op).await;
            this.complete(op, outcome, started.elapsed(), batch_no, &breaker);
        }))
        .await;
    }

    fn complete(
        &self,
        op: Operation,
        outcome: Result<Value, String>,
        elapsed: Duration,
        batch_no: u64,
        breaker: &CircuitBreaker,
    ) {
        match outcome {
            Ok(_) => breaker.record_success(),
            Err(ref error) => {
                breaker.record_failure();
                if op.retry_count < self.config.max_operation_retries {
                    let mut op = op;
                    op.retry_count += 1;
                    warn!(
                        "Operation {} failed ({}); requeueing, retry {} of {}",
                        op.id, error, op.retry_count, self.config.max_operation_retries
                    );
                    let mut state = self.state.lock();
                    state.release(&op.id, batch_no);
                    state.queue.push(op);
                    return;
                }
            }
        }
        self.store(&op, outcome, elapsed, batch_no);
    }

    fn store(&self, op: &Operation, outcome: Result<Value, String>, elapsed: Duration, batch_no: u64) {
        let success = outcome.is_ok();
        let (data, error) = match outcome {
            Ok(data) => (Some(data), None),
            Err(error) => (None, Some(error)),
        };

        let mut state = self.state.lock();
        state.release(&op.id, batch_no);
        if state.results.contains_key(&op.id) {
            warn!("Ignoring second result for operation {}", op.id);
            return;
        }
        state.results.insert(
            op.id.clone(),
            OperationResult {
                success,
                data,
                error,
                response_time: elapsed,
                completed_at: self.clock.utc_now(),
                retry_count: op.retry_count,
                batch: batch_no,
            },
        );
        if success {
            state.succeeded += 1;
        } else {
            info!("Operation {} ({}) failed", op.id, op.name);
            state.failed += 1;
        }
    }
}

pub struct BatchCoordinatorBuilder {
    executor: Arc<dyn OperationExecutor>,
    config: BatchConfig,
    breakers: Option<Arc<BreakerRegistry>>,
    clock: SharedClock,
}

impl BatchCoordinatorBuilder {
    pub fn new(executor: Arc<dyn OperationExecutor>) -> Self {
        Self {
            executor,
            config: BatchConfig::default(),
            breakers: None,
            clock: SystemClock::shared(),
        }
    }

    pub fn config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Share per-operation breakers with other components
    pub fn breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> BatchResult<BatchCoordinator> {
        self.config.validate()?;
        let breakers = self
            .breakers
            .unwrap_or_else(|| Arc::new(BreakerRegistry::new(Default::default(), self.clock.clone())));

        Ok(BatchCoordinator {
            inner: Arc::new(Inner {
                slots: Arc::new(Semaphore::new(self.config.max_concurrent_batches)),
                config: self.config,
                executor: self.executor,
                breakers,
                clock: self.clock,
                state: Mutex::new(State::default()),
                sequence: AtomicU64::new(0),
                pump_scheduled: AtomicBool::new(false),
                debounce_armed: AtomicBool::new(false),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use waypoint_resilience::CircuitBreakerConfig;

    #[derive(Default)]
    struct FakeExecutor {
        calls: Mutex<Vec<String>>,
        many_calls: Mutex<Vec<Vec<String>>>,
        fail_many: bool,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl OperationExecutor for FakeExecutor {
        async fn execute(&self, operation: &Operation) -> Result<Value, String> {
            self.calls.lock().push(operation.url.clone());
            if operation.url.contains("panic") {
                panic!("executor blew up");
            }
            if self.failing.contains(&operation.url) {
                return Err("HTTP 500: boom".to_string());
            }
            Ok(json!({"url": operation.url}))
        }

        async fn execute_many(&self, urls: &[String]) -> Result<Vec<Result<Value, String>>, String> {
            self.many_calls.lock().push(urls.to_vec());
            if self.fail_many {
                return Err("batch endpoint unavailable".to_string());
            }
            Ok(urls.iter().map(|u| Ok(json!({"url": u}))).collect())
        }
    }

    fn coordinator(executor: Arc<FakeExecutor>, config: BatchConfig) -> BatchCoordinator {
        BatchCoordinator::new(config, executor).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_operation_gets_exactly_one_result() {
        let executor = Arc::new(FakeExecutor::default());
        let batcher = coordinator(executor.clone(), BatchConfig::default());
        let priorities = [Priority::High, Priority::Normal, Priority::Low];

        let ids: Vec<String> = (0..25)
            .map(|i| {
                let method = if i % 4 == 0 { HttpMethod::Post } else { HttpMethod::Get };
                batcher
                    .add_operation(
                        method,
                        format!("/api/v1/subjects/{}", i),
                        None,
                        Some(priorities[i % 3]),
                        None,
                    )
                    .unwrap()
            })
            .collect();

        batcher.flush().await;

        let stats = batcher.stats();
        assert_eq!(stats.results, 25);
        assert_eq!(stats.succeeded, 25);
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.in_flight, 0);
        for id in &ids {
            assert!(batcher.get_result(id).unwrap().success);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_priority_dispatched_no_later_than_low() {
        let executor = Arc::new(FakeExecutor::default());
        let batcher = coordinator(executor, BatchConfig::default());

        let high = batcher
            .add_operation(HttpMethod::Get, "/api/v1/subjects", None, Some(Priority::High), None)
            .unwrap();
        let low = batcher
            .add_operation(HttpMethod::Get, "/api/v1/careers", None, Some(Priority::Low), None)
            .unwrap();

        let timeout = Duration::from_secs(10);
        let high = batcher.wait_for_result(&high, timeout).await.unwrap();
        let low = batcher.wait_for_result(&low, timeout).await.unwrap();
        assert!(high.batch <= low.batch);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_orders_single_slot_batches() {
        let executor = Arc::new(FakeExecutor::default());
        let config = BatchConfig {
            max_batch_size: 1,
            max_concurrent_batches: 1,
            ..Default::default()
        };
        let batcher = coordinator(executor, config);

        let low = batcher
            .add_operation(HttpMethod::Get, "/api/v1/careers", None, Some(Priority::Low), None)
            .unwrap();
        let high = batcher
            .add_operation(HttpMethod::Get, "/api/v1/subjects", None, Some(Priority::High), None)
            .unwrap();
        batcher.flush().await;

        let low = batcher.get_result(&low).unwrap();
        let high = batcher.get_result(&high).unwrap();
        assert!(high.batch < low.batch);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependency_dispatched_after_parent_completes() {
        let executor = Arc::new(FakeExecutor::default());
        let batcher = coordinator(executor.clone(), BatchConfig::default());

        let parent = batcher
            .add(OperationRequest::post("/api/admin/courses", json!({"title": "Law"})))
            .unwrap();
        let child = batcher
            .add(
                OperationRequest::post("/api/admin/prerequisites", json!({"course": 1}))
                    .with_priority(Priority::High)
                    .depends_on(parent.clone()),
            )
            .unwrap();
        batcher.flush().await;

        let parent = batcher.get_result(&parent).unwrap();
        let child = batcher.get_result(&child).unwrap();
        assert!(parent.batch < child.batch);
        assert_eq!(
            *executor.calls.lock(),
            vec!["/api/admin/courses".to_string(), "/api/admin/prerequisites".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_dependency_does_not_block() {
        let executor = Arc::new(FakeExecutor::default());
        let batcher = coordinator(executor, BatchConfig::default());

        let id = batcher
            .add(OperationRequest::get("/api/v1/tags").depends_on("never-enqueued"))
            .unwrap();
        let result = batcher
            .wait_for_result(&id, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gets_coalesced_into_one_request() {
        let executor = Arc::new(FakeExecutor::default());
        let batcher = coordinator(executor.clone(), BatchConfig::default());

        for path in ["/api/v1/subjects", "/api/v1/careers", "/api/v1/tags"] {
            batcher.add(OperationRequest::get(path)).unwrap();
        }
        batcher
            .add(OperationRequest::put("/api/admin/tags/2", json!({"name": "STEM"})))
            .unwrap();
        batcher.flush().await;

        assert_eq!(executor.many_calls.lock().len(), 1);
        assert_eq!(executor.many_calls.lock()[0].len(), 3);
        assert_eq!(*executor.calls.lock(), vec!["/api/admin/tags/2".to_string()]);
        assert_eq!(batcher.stats().succeeded, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_coalesced_get_falls_back_per_url() {
        let executor = Arc::new(FakeExecutor {
            fail_many: true,
            ..Default::default()
        });
        let batcher = coordinator(executor.clone(), BatchConfig::default());

        batcher.add(OperationRequest::get("/api/v1/subjects")).unwrap();
        batcher.add(OperationRequest::get("/api/v1/careers")).unwrap();
        batcher.flush().await;

        assert_eq!(executor.many_calls.lock().len(), 1);
        assert_eq!(executor.calls.lock().len(), 2);
        assert_eq!(batcher.stats().succeeded, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_short_circuits_operation() {
        let executor = Arc::new(FakeExecutor::default());
        let breakers = Arc::new(BreakerRegistry::new(
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
            SystemClock::shared(),
        ));
        breakers.get_or_create("GET /api/v1/subjects").record_failure();

        let batcher = BatchCoordinator::builder(executor.clone())
            .breakers(breakers)
            .build()
            .unwrap();
        let id = batcher
            .add(OperationRequest::get("/api/v1/subjects?page=3"))
            .unwrap();
        batcher.flush().await;

        let result = batcher.get_result(&id).unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Circuit breaker open"));
        assert!(executor.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_operation_requeued_up_to_limit() {
        let executor = Arc::new(FakeExecutor {
            failing: ["/api/v1/careers".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let config = BatchConfig {
            max_operation_retries: 1,
            ..Default::default()
        };
        let batcher = coordinator(executor.clone(), config);

        let id = batcher.add(OperationRequest::delete("/api/v1/careers")).unwrap();
        batcher.flush().await;

        let result = batcher.get_result(&id).unwrap();
        assert!(!result.success);
        assert_eq!(result.retry_count, 1);
        assert_eq!(result.error.as_deref(), Some("HTTP 500: boom"));
        assert_eq!(executor.calls.lock().len(), 2);
    }

    /// Fails the first attempt at `/api/admin/careers`, then runs it slowly
    #[derive(Default)]
    struct TimedExecutor {
        attempts: Mutex<HashMap<String, u32>>,
        log: Mutex<Vec<(String, &'static str)>>,
    }

    #[async_trait]
    impl OperationExecutor for TimedExecutor {
        async fn execute(&self, operation: &Operation) -> Result<Value, String> {
            let attempt = {
                let mut attempts = self.attempts.lock();
                let n = attempts.entry(operation.url.clone()).or_default();
                *n += 1;
                *n
            };
            self.log.lock().push((operation.url.clone(), "start"));
            let outcome = match (operation.url.as_str(), attempt) {
                ("/api/admin/careers", 1) => Err("HTTP 503: busy".to_string()),
                ("/api/admin/careers", _) => {
                    sleep(Duration::from_secs(20)).await;
                    Ok(json!({"id": 7}))
                }
                ("/api/admin/reindex", _) => {
                    sleep(Duration::from_secs(10)).await;
                    Ok(json!({"queued": true}))
                }
                _ => Ok(json!({})),
            };
            self.log.lock().push((operation.url.clone(), "end"));
            outcome
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeued_parent_still_blocks_dependents() {
        let executor = Arc::new(TimedExecutor::default());
        let config = BatchConfig {
            max_operation_retries: 1,
            max_concurrent_batches: 3,
            ..Default::default()
        };
        let batcher = BatchCoordinator::new(config, executor.clone()).unwrap();

        // Batch 1: the parent fails fast and is requeued while the reindex keeps the batch open
        batcher
            .add(OperationRequest::post("/api/admin/reindex", json!({})))
            .unwrap();
        let parent = batcher
            .add(OperationRequest::post("/api/admin/careers", json!({"title": "Vet"})))
            .unwrap();
        sleep(Duration::from_millis(1)).await;

        // Batch 2 picks the parent up again
        batcher
            .add(OperationRequest::post("/api/admin/tags", json!({"name": "Animals"})))
            .unwrap();
        sleep(Duration::from_millis(1)).await;

        let child = batcher
            .add(
                OperationRequest::put("/api/admin/careers/7/subjects", json!({"ids": [4]}))
                    .depends_on(parent.clone()),
            )
            .unwrap();
        batcher.flush().await;

        let parent = batcher.get_result(&parent).unwrap();
        let child = batcher.get_result(&child).unwrap();
        assert!(parent.success);
        assert_eq!(parent.retry_count, 1);
        assert!(child.success);
        assert!(parent.batch < child.batch);

        let log = executor.log.lock();
        let position = |url: &str, event: &str| {
            log.iter()
                .rposition(|(u, e)| u == url && *e == event)
                .unwrap()
        };
        assert!(
            position("/api/admin/careers", "end")
                < position("/api/admin/careers/7/subjects", "start")
        );
        assert_eq!(batcher.stats().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_batch_fails_its_operations() {
        let executor = Arc::new(FakeExecutor::default());
        let batcher = coordinator(executor, BatchConfig::default());

        let id = batcher.add(OperationRequest::get("/api/panic")).unwrap();
        batcher.flush().await;

        let result = batcher.get_result(&id).unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Batch execution failed"));
        assert_eq!(batcher.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_unknown_result_times_out() {
        let batcher = coordinator(Arc::new(FakeExecutor::default()), BatchConfig::default());
        let err = batcher
            .wait_for_result("missing", Duration::from_millis(350))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_results() {
        let batcher = coordinator(Arc::new(FakeExecutor::default()), BatchConfig::default());
        let id = batcher.add(OperationRequest::get("/api/health")).unwrap();
        batcher.wait_for_result(&id, Duration::from_secs(1)).await.unwrap();

        batcher.clear_results();
        assert!(batcher.get_result(&id).is_none());
        assert_eq!(batcher.stats().succeeded, 1);
    }
}
