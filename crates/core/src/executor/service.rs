//! Executor service: single, parallel and batched execution.

use std::future::Future;
use std::sync::Arc;

use faultline_common::resilience::{Clock, SystemClock};
use faultline_common::utils::{panic_message, Contained};
use faultline_domain::constants::{CONTEXT_ATTEMPT, CONTEXT_OPERATION};
use faultline_domain::{ExecutorConfig, FaultError, FaultSeverity, FaultSource};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::breaker::{CircuitBreakerOptions, GuardedOperation};
use super::error::ExecutorError;
use super::operation::{AsyncOperation, AsyncResult, RetryEvent, WorkFn};
use super::ports::FaultReporter;

/// Options for [`OperationExecutor::execute_parallel`]
#[derive(Debug, Clone, Copy)]
pub struct ParallelOptions {
    /// Upper bound on operations in flight; zero is treated as one
    pub max_concurrency: usize,
    /// Stop starting new operations after the first failure
    pub stop_on_error: bool,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self { max_concurrency: 5, stop_on_error: false }
    }
}

/// Options for [`OperationExecutor::batch`]
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Name used in logs and reported faults
    pub name: String,
    /// Keep processing later chunks after a chunk fails
    pub continue_on_error: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { name: "batch".to_string(), continue_on_error: true }
    }
}

/// A chunk whose processor failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub message: String,
}

/// Accumulated results of a batch run
#[derive(Debug, Clone)]
pub struct BatchOutcome<R> {
    pub results: Vec<R>,
    pub failures: Vec<BatchFailure>,
    pub batches: usize,
}

/// Runs [`AsyncOperation`]s.
///
/// An executor without a reporter is "detached": failures are only logged.
/// The recovery orchestrator runs strategies on a detached executor so a
/// failing strategy never feeds back into the recorder.
#[derive(Clone)]
pub struct OperationExecutor {
    reporter: Option<Arc<dyn FaultReporter>>,
    clock: Arc<dyn Clock>,
    defaults: ExecutorConfig,
}

impl std::fmt::Debug for OperationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationExecutor")
            .field("reporting", &self.reporter.is_some())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Default for OperationExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationExecutor {
    /// Detached executor with default settings
    pub fn new() -> Self {
        Self { reporter: None, clock: Arc::new(SystemClock), defaults: ExecutorConfig::default() }
    }

    /// Forward failed attempts to `reporter`
    pub fn with_reporter(mut self, reporter: Arc<dyn FaultReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Clock used by circuit breakers created from this executor
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defaults applied by [`Self::operation`]
    pub fn with_defaults(mut self, defaults: ExecutorConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Build an operation using this executor's configured defaults
    pub fn operation<T, F, Fut>(&self, name: impl Into<String>, work: F) -> AsyncOperation<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        AsyncOperation::new(name, work)
            .timeout(self.defaults.default_timeout())
            .retries(self.defaults.default_retries)
            .retry_delay(self.defaults.default_retry_delay())
    }

    /// Run `op` to completion. Never fails; inspect the result.
    #[instrument(skip(self, op), fields(operation = %op.name, attempts = op.total_attempts()))]
    pub async fn execute<T: Send + 'static>(&self, op: AsyncOperation<T>) -> AsyncResult<T> {
        let started = Instant::now();
        let total = op.total_attempts();
        let mut last_error = None;

        for attempt in 1..=total {
            match run_attempt(&op.name, &op.work, op.timeout).await {
                Ok(value) => {
                    debug!(attempt, "Operation succeeded");
                    return AsyncResult::succeeded(value, attempt, started.elapsed(), false);
                }
                Err(error) => {
                    let exhausted = attempt == total;
                    let severity = if exhausted { op.severity } else { FaultSeverity::Low };
                    warn!(attempt, error = %error, "Operation attempt failed");
                    self.report(&op, &error, attempt, severity, !exhausted || op.fallback.is_some())
                        .await;

                    if !exhausted {
                        let delay = op.backoff.delay_for(attempt);
                        if let Some(callback) = &op.on_retry {
                            callback(&RetryEvent {
                                operation: op.name.clone(),
                                attempt,
                                error: error.clone(),
                                delay,
                            });
                        }
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        let Some(fallback) = op.fallback.clone() else {
            let error = last_error.unwrap_or_else(|| ExecutorError::Failed {
                operation: op.name.clone(),
                message: "no attempts were made".to_string(),
            });
            return AsyncResult::failed(error, total, started.elapsed());
        };

        let message = match tokio::spawn(Contained::new(fallback())).await {
            Ok(Ok(value)) => {
                debug!("Fallback supplied the result");
                return AsyncResult::succeeded(value, total, started.elapsed(), true);
            }
            Ok(Err(err)) => format!("{err:#}"),
            Err(join) if join.is_panic() => panic_message(join.into_panic().as_ref()),
            Err(join) => join.to_string(),
        };
        let error = ExecutorError::FallbackFailed { operation: op.name.clone(), message };
        warn!(error = %error, "Fallback failed");
        self.report(&op, &error, total, op.severity, false).await;
        AsyncResult::failed(error, total, started.elapsed())
    }

    /// [`Self::execute`], re-raising the terminal error
    pub async fn try_execute<T: Send + 'static>(
        &self,
        op: AsyncOperation<T>,
    ) -> Result<T, ExecutorError> {
        self.execute(op).await.into_result()
    }

    /// Run operations with bounded overlap.
    ///
    /// The returned vector is aligned with `ops`. `None` marks an operation
    /// that was never started because `stop_on_error` tripped.
    #[instrument(skip(self, ops), fields(count = ops.len(), max = options.max_concurrency))]
    pub async fn execute_parallel<T: Send + 'static>(
        &self,
        ops: Vec<AsyncOperation<T>>,
        options: ParallelOptions,
    ) -> Vec<Option<AsyncResult<T>>> {
        let limit = options.max_concurrency.max(1);
        let mut results: Vec<Option<AsyncResult<T>>> = std::iter::repeat_with(|| None)
            .take(ops.len())
            .collect();
        let mut pending = ops.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut stopped = false;

        loop {
            while !stopped && in_flight.len() < limit {
                let Some((index, op)) = pending.next() else { break };
                in_flight.push(async move { (index, self.execute(op).await) });
            }

            let Some((index, result)) = in_flight.next().await else { break };
            if !result.success && options.stop_on_error && !stopped {
                debug!(index, "Stopping parallel execution after failure");
                stopped = true;
            }
            results[index] = Some(result);
        }

        results
    }

    /// Wrap `op` in a stateful circuit breaker
    pub fn circuit_breaker<T: Send + 'static>(
        &self,
        op: AsyncOperation<T>,
        options: CircuitBreakerOptions,
    ) -> faultline_common::CommonResult<GuardedOperation<T>> {
        GuardedOperation::new(op, options, Arc::clone(&self.clock), self.reporter.clone())
    }

    /// Process `items` in chunks of `batch_size`, one chunk at a time.
    ///
    /// `processor` receives each chunk and its index. With
    /// `continue_on_error` a failed chunk is recorded and skipped; otherwise
    /// the first failure is returned as [`ExecutorError::BatchFailed`].
    #[instrument(skip(self, items, processor), fields(batch = %options.name, items = items.len()))]
    pub async fn batch<I, R, F, Fut>(
        &self,
        items: Vec<I>,
        batch_size: usize,
        mut processor: F,
        options: BatchOptions,
    ) -> Result<BatchOutcome<R>, ExecutorError>
    where
        F: FnMut(Vec<I>, usize) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<R>>>,
    {
        let size = batch_size.max(1);
        let mut outcome = BatchOutcome { results: Vec::new(), failures: Vec::new(), batches: 0 };
        let mut items = items.into_iter().peekable();

        while items.peek().is_some() {
            let chunk: Vec<I> = items.by_ref().take(size).collect();
            let batch_index = outcome.batches;
            outcome.batches += 1;

            match processor(chunk, batch_index).await {
                Ok(results) => outcome.results.extend(results),
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(batch_index, %message, "Batch chunk failed");
                    if let Some(reporter) = &self.reporter {
                        let mut context = faultline_domain::FaultContext::new();
                        context.insert(CONTEXT_OPERATION.into(), options.name.clone().into());
                        context.insert("batch_index".into(), batch_index.into());
                        reporter
                            .report_fault(
                                FaultError::new(message.clone()).with_kind("BatchFailed"),
                                FaultSeverity::Medium,
                                FaultSource::CoreProcess,
                                options.continue_on_error,
                                context,
                            )
                            .await;
                    }
                    if !options.continue_on_error {
                        return Err(ExecutorError::BatchFailed { batch_index, message });
                    }
                    outcome.failures.push(BatchFailure { batch_index, message });
                }
            }
        }

        Ok(outcome)
    }

    async fn report<T>(
        &self,
        op: &AsyncOperation<T>,
        error: &ExecutorError,
        attempt: u32,
        severity: FaultSeverity,
        handled: bool,
    ) {
        let Some(reporter) = &self.reporter else {
            return;
        };
        let mut context = op.context.clone();
        context.insert(CONTEXT_OPERATION.into(), op.name.clone().into());
        context.insert(CONTEXT_ATTEMPT.into(), attempt.into());
        let fault = FaultError::new(error.to_string()).with_kind(error_kind(error));
        reporter.report_fault(fault, severity, op.source, handled, context).await;
    }
}

/// Run one attempt on its own task.
///
/// On timeout the task handle is dropped: the work keeps running detached and
/// its eventual result is ignored.
pub(crate) async fn run_attempt<T: Send + 'static>(
    name: &str,
    work: &WorkFn<T>,
    timeout: std::time::Duration,
) -> Result<T, ExecutorError> {
    let handle = tokio::spawn(Contained::new(work()));
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => {
            Err(ExecutorError::Failed { operation: name.to_string(), message: format!("{err:#}") })
        }
        Ok(Err(join)) if join.is_panic() => Err(ExecutorError::Panicked {
            operation: name.to_string(),
            message: panic_message(join.into_panic().as_ref()),
        }),
        Ok(Err(join)) => {
            Err(ExecutorError::Failed { operation: name.to_string(), message: join.to_string() })
        }
        Err(_) => Err(ExecutorError::Timeout { operation: name.to_string(), timeout }),
    }
}

fn error_kind(error: &ExecutorError) -> &'static str {
    match error {
        ExecutorError::Timeout { .. } => "Timeout",
        ExecutorError::Failed { .. } => "OperationFailed",
        ExecutorError::Panicked { .. } => "Panic",
        ExecutorError::CircuitOpen { .. } => "CircuitOpen",
        ExecutorError::BatchFailed { .. } => "BatchFailed",
        ExecutorError::FallbackFailed { .. } => "FallbackFailed",
    }
}
