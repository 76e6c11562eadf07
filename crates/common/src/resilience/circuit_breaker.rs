//! Circuit breaker guarding a repeatedly invoked operation.
//!
//! State machine:
//! - `Closed`: calls pass through. Each failure increments a consecutive
//!   failure counter and any success resets it. Reaching the threshold opens
//!   the circuit.
//! - `Open`: calls are rejected immediately until `reset_timeout` has elapsed
//!   since the last failure.
//! - `HalfOpen`: exactly one trial call is admitted. Success closes the
//!   circuit, failure re-opens it. Concurrent calls during the trial are
//!   rejected.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use crate::error::{CommonError, CommonResult};
use crate::utils::serde::duration_millis;

/// Errors produced by guarded operations.
///
/// Generic over the operation's own error type so the original failure is
/// preserved as the `source`.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit is open, the call never ran
    #[error("Circuit breaker is open, retry in {retry_in:?}")]
    CircuitOpen {
        /// Remaining time before a trial call is admitted
        retry_in: Duration,
    },

    /// Operation exceeded the per-call timeout
    #[error("Operation timed out after {timeout:?}")]
    Timeout {
        /// Timeout that was exceeded
        timeout: Duration,
    },

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        /// Error returned by the operation
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// True when the call was rejected without running
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// Boxed error type for type-erased failures
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for guarded operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Circuit states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls are rejected
    Open,
    /// One trial call decides whether to close again
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Per-call timeout; a timed out call counts as a failure
    #[serde(with = "duration_millis")]
    pub call_timeout: Duration,
    /// Time after the last failure before a trial call is admitted
    #[serde(with = "duration_millis")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            call_timeout: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Builder starting from the defaults
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    /// Reject zero thresholds and zero durations
    pub fn validate(&self) -> CommonResult<()> {
        if self.failure_threshold == 0 {
            return Err(CommonError::config_field(
                "failure_threshold",
                "failure_threshold must be greater than 0",
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(CommonError::config_field(
                "call_timeout",
                "call_timeout must be greater than 0",
            ));
        }
        if self.reset_timeout.is_zero() {
            return Err(CommonError::config_field(
                "reset_timeout",
                "reset_timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    /// Set the failure threshold
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set the per-call timeout
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    /// Set the open-to-half-open delay
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> CommonResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time breaker counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerMetrics {
    /// Current state
    pub state: CircuitState,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Calls that ran the operation
    pub total_calls: u64,
    /// Calls rejected while open or during a trial
    pub rejected_calls: u64,
    /// Calls that succeeded
    pub successes: u64,
    /// Calls that failed or timed out
    pub failures: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

/// Admission granted by [`CircuitBreaker::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Releases the half-open trial slot if the trial future is dropped before
/// it reports an outcome.
struct TrialGuard<'a> {
    inner: &'a Mutex<BreakerState>,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.lock().trial_in_flight = false;
        }
    }
}

/// Circuit breaker with a pluggable clock.
///
/// Clones share state, so one breaker can guard calls from many tasks.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    total_calls: Arc<AtomicU64>,
    rejected_calls: Arc<AtomicU64>,
    successes: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            total_calls: Arc::clone(&self.total_calls),
            rejected_calls: Arc::clone(&self.rejected_calls),
            successes: Arc::clone(&self.successes),
            failures: Arc::clone(&self.failures),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Breaker using the system clock
    pub fn new(config: CircuitBreakerConfig) -> CommonResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Breaker using a custom clock
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> CommonResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                trial_in_flight: false,
            })),
            total_calls: Arc::new(AtomicU64::new(0)),
            rejected_calls: Arc::new(AtomicU64::new(0)),
            successes: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU64::new(0)),
            clock: Arc::new(clock),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, without performing the open-to-half-open transition
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot of the counters
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_calls: self.total_calls.load(Ordering::Acquire),
            rejected_calls: self.rejected_calls.load(Ordering::Acquire),
            successes: self.successes.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
        }
    }

    /// Force the circuit closed and clear the failure count
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure = None;
        inner.trial_in_flight = false;
        info!("Circuit breaker manually reset");
    }

    /// Run `operation` under breaker protection and the per-call timeout.
    ///
    /// A timed-out call drops the operation future and counts as a failure.
    #[instrument(skip(self, operation), fields(state = %self.state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let admission = match self.acquire() {
            Ok(admission) => admission,
            Err(retry_in) => {
                self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                debug!(?retry_in, "Circuit breaker rejecting call");
                return Err(ResilienceError::CircuitOpen { retry_in });
            }
        };
        let mut guard =
            TrialGuard { inner: &self.inner, armed: admission == Admission::Trial };
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let outcome = tokio::time::timeout(self.config.call_timeout, operation()).await;
        guard.armed = false;

        match outcome {
            Ok(Ok(value)) => {
                self.on_success();
                Ok(value)
            }
            Ok(Err(source)) => {
                self.on_failure();
                warn!(error = %source, "Circuit breaker: operation failed");
                Err(ResilienceError::OperationFailed { source })
            }
            Err(_) => {
                self.on_failure();
                warn!(timeout = ?self.config.call_timeout, "Circuit breaker: operation timed out");
                Err(ResilienceError::Timeout { timeout: self.config.call_timeout })
            }
        }
    }

    /// Decide whether a call may run; `Err` carries the time until a trial.
    fn acquire(&self) -> Result<Admission, Duration> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let since_failure = inner
                    .last_failure
                    .map_or(self.config.reset_timeout, |at| {
                        self.clock.now().saturating_duration_since(at)
                    });
                if since_failure >= self.config.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!("Circuit breaker half-open, admitting trial call");
                    Ok(Admission::Trial)
                } else {
                    Err(self.config.reset_timeout - since_failure)
                }
            }
            CircuitState::HalfOpen if inner.trial_in_flight => Err(Duration::ZERO),
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                Ok(Admission::Trial)
            }
        }
    }

    fn on_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            info!("Circuit breaker closed after successful trial");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.trial_in_flight = false;
    }

    fn on_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure = Some(now);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.trial_in_flight = false;
                warn!("Circuit breaker re-opened after failed trial");
            }
            CircuitState::Closed
                if inner.consecutive_failures >= self.config.failure_threshold =>
            {
                inner.state = CircuitState::Open;
                warn!(failures = inner.consecutive_failures, "Circuit breaker opened");
            }
            _ => {}
        }
    }
}
