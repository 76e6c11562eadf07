//! Operation description and execution result.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use faultline_common::resilience::BackoffStrategy;
use faultline_domain::constants::{
    DEFAULT_OPERATION_RETRIES, DEFAULT_OPERATION_TIMEOUT_MS, DEFAULT_RETRY_DELAY_MS,
};
use faultline_domain::{FaultContext, FaultSeverity, FaultSource};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::error::ExecutorError;

/// Re-invocable unit of work. Each attempt calls it again.
pub type WorkFn<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Callback invoked after a failed attempt that will be retried
pub type RetryCallback = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// Details passed to the `on_retry` callback
#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub operation: String,
    /// Attempt that just failed, 1-based
    pub attempt: u32,
    pub error: ExecutorError,
    /// Wait before the next attempt
    pub delay: Duration,
}

/// A named unit of work plus its execution policy.
///
/// ```rust,ignore
/// let op = AsyncOperation::new("load-profile", || async { load().await })
///     .timeout(Duration::from_secs(5))
///     .retries(3)
///     .retry_delay(Duration::from_millis(200))
///     .fallback_value(Profile::default());
/// ```
pub struct AsyncOperation<T> {
    pub(crate) name: String,
    pub(crate) work: WorkFn<T>,
    pub(crate) timeout: Duration,
    pub(crate) retries: u32,
    pub(crate) backoff: BackoffStrategy,
    pub(crate) fallback: Option<WorkFn<T>>,
    pub(crate) on_retry: Option<RetryCallback>,
    pub(crate) severity: FaultSeverity,
    pub(crate) source: FaultSource,
    pub(crate) context: FaultContext,
}

impl<T> fmt::Debug for AsyncOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOperation")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("backoff", &self.backoff)
            .field("has_fallback", &self.fallback.is_some())
            .field("severity", &self.severity)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> AsyncOperation<T> {
    /// Operation with the default policy: 30s timeout, 3 attempts, 1s linear
    /// backoff, medium severity, core-process source.
    pub fn new<F, Fut>(name: impl Into<String>, work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            work: Arc::new(move || work().boxed()),
            timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            retries: DEFAULT_OPERATION_RETRIES,
            backoff: BackoffStrategy::linear(Duration::from_millis(DEFAULT_RETRY_DELAY_MS)),
            fallback: None,
            on_retry: None,
            severity: FaultSeverity::Medium,
            source: FaultSource::CoreProcess,
            context: FaultContext::new(),
        }
    }

    /// Per-attempt deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts, including the first. Zero is treated as one.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Base delay for linear backoff: `delay × attempt`
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.backoff = BackoffStrategy::linear(delay);
        self
    }

    /// Replace the backoff schedule entirely
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Work to run once every attempt has failed
    pub fn fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move || fallback().boxed()));
        self
    }

    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Severity reported for the final exhausted attempt
    pub fn severity(mut self, severity: FaultSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn source(mut self, source: FaultSource) -> Self {
        self.source = source;
        self
    }

    /// Attach a context entry forwarded with every reported failure
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncOperation<T> {
    /// Fall back to a fixed value
    pub fn fallback_value(self, value: T) -> Self {
        self.fallback(move || {
            let value = value.clone();
            async move { Ok(value) }
        })
    }
}

impl<T> AsyncOperation<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn total_attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

/// Outcome of [`super::OperationExecutor::execute`]
#[derive(Debug, Clone)]
pub struct AsyncResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ExecutorError>,
    /// Attempts of the primary work (the fallback is not counted)
    pub attempts: u32,
    pub duration: Duration,
    pub used_fallback: bool,
}

impl<T> AsyncResult<T> {
    pub(crate) fn succeeded(data: T, attempts: u32, duration: Duration, used_fallback: bool) -> Self {
        Self { success: true, data: Some(data), error: None, attempts, duration, used_fallback }
    }

    pub(crate) fn failed(error: ExecutorError, attempts: u32, duration: Duration) -> Self {
        Self { success: false, data: None, error: Some(error), attempts, duration, used_fallback: false }
    }

    /// Re-raise the terminal error
    pub fn into_result(self) -> Result<T, ExecutorError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ExecutorError::Failed {
                operation: String::new(),
                message: "operation produced no value".to_string(),
            }),
        }
    }
}
