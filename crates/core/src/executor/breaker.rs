//! Operations wrapped in a circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use faultline_common::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, Clock,
    ResilienceError,
};
use faultline_common::utils::{panic_message, Contained};
use faultline_common::CommonResult;
use faultline_domain::constants::CONTEXT_OPERATION;
use faultline_domain::{FaultError, FaultSeverity};
use tracing::debug;

use super::error::ExecutorError;
use super::operation::AsyncOperation;
use super::ports::FaultReporter;

/// Breaker parameters for [`super::OperationExecutor::circuit_breaker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerOptions {
    /// Consecutive failures that open the circuit
    pub threshold: u32,
    /// Per-call timeout
    pub timeout: Duration,
    /// Cooldown after the last failure before a trial call
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        let config = CircuitBreakerConfig::default();
        Self {
            threshold: config.failure_threshold,
            timeout: config.call_timeout,
            reset_timeout: config.reset_timeout,
        }
    }
}

impl From<CircuitBreakerOptions> for CircuitBreakerConfig {
    fn from(options: CircuitBreakerOptions) -> Self {
        Self {
            failure_threshold: options.threshold,
            call_timeout: options.timeout,
            reset_timeout: options.reset_timeout,
        }
    }
}

/// A stateful callable: each [`GuardedOperation::call`] runs the work once
/// unless the circuit is open. Clones share the breaker.
pub struct GuardedOperation<T> {
    op: Arc<AsyncOperation<T>>,
    breaker: CircuitBreaker<Arc<dyn Clock>>,
    reporter: Option<Arc<dyn FaultReporter>>,
}

impl<T> Clone for GuardedOperation<T> {
    fn clone(&self) -> Self {
        Self {
            op: Arc::clone(&self.op),
            breaker: self.breaker.clone(),
            reporter: self.reporter.clone(),
        }
    }
}

impl<T> std::fmt::Debug for GuardedOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedOperation")
            .field("operation", &self.op.name)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl<T: Send + 'static> GuardedOperation<T> {
    pub(crate) fn new(
        op: AsyncOperation<T>,
        options: CircuitBreakerOptions,
        clock: Arc<dyn Clock>,
        reporter: Option<Arc<dyn FaultReporter>>,
    ) -> CommonResult<Self> {
        let breaker = CircuitBreaker::with_clock(options.into(), clock)?;
        Ok(Self { op: Arc::new(op), breaker, reporter })
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.breaker.metrics()
    }

    /// Close the circuit and forget past failures
    pub fn reset(&self) {
        self.breaker.reset();
    }

    /// Run the work once under the breaker.
    ///
    /// Rejected calls return [`ExecutorError::CircuitOpen`] without invoking
    /// the work and are not reported as faults.
    pub async fn call(&self) -> Result<T, ExecutorError> {
        let name = self.op.name.clone();
        let work = Arc::clone(&self.op.work);
        let outcome = self
            .breaker
            .execute(|| async move {
                match tokio::spawn(Contained::new(work())).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(ExecutorError::Failed {
                        operation: name,
                        message: format!("{err:#}"),
                    }),
                    Err(join) if join.is_panic() => Err(ExecutorError::Panicked {
                        operation: name,
                        message: panic_message(join.into_panic().as_ref()),
                    }),
                    Err(join) => {
                        Err(ExecutorError::Failed { operation: name, message: join.to_string() })
                    }
                }
            })
            .await;

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(ResilienceError::CircuitOpen { retry_in }) => {
                debug!(operation = %self.op.name, ?retry_in, "Call rejected by open circuit");
                return Err(ExecutorError::CircuitOpen { operation: self.op.name.clone(), retry_in });
            }
            Err(ResilienceError::Timeout { timeout }) => {
                ExecutorError::Timeout { operation: self.op.name.clone(), timeout }
            }
            Err(ResilienceError::OperationFailed { source }) => source,
        };

        if let Some(reporter) = &self.reporter {
            let mut context = self.op.context.clone();
            context.insert(CONTEXT_OPERATION.into(), self.op.name.clone().into());
            context.insert("circuit_state".into(), self.breaker.state().to_string().into());
            reporter
                .report_fault(
                    FaultError::new(error.to_string()).with_kind("CircuitBreakerFailure"),
                    FaultSeverity::Low,
                    self.op.source,
                    true,
                    context,
                )
                .await;
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use anyhow::anyhow;
    use faultline_common::resilience::MockClock;

    use super::*;
    use crate::executor::OperationExecutor;

    fn flaky(calls: Arc<AtomicU32>, healthy: Arc<AtomicU32>) -> AsyncOperation<&'static str> {
        AsyncOperation::new("flaky", move || {
            let calls = Arc::clone(&calls);
            let healthy = Arc::clone(&healthy);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if healthy.load(Ordering::SeqCst) == 1 {
                    Ok("ok")
                } else {
                    Err(anyhow!("unavailable"))
                }
            }
        })
    }

    /// Validates open, reject, trial and close transitions.
    ///
    /// Assertions:
    /// - Two failures with threshold 2 open the circuit.
    /// - Calls while open do not invoke the work.
    /// - After the reset timeout one trial runs and success closes the circuit.
    #[tokio::test]
    async fn test_breaker_opens_rejects_and_recovers() {
        let clock = MockClock::new();
        let executor = OperationExecutor::new().with_clock(Arc::new(clock.clone()));
        let calls = Arc::new(AtomicU32::new(0));
        let healthy = Arc::new(AtomicU32::new(0));
        let guarded = executor
            .circuit_breaker(
                flaky(Arc::clone(&calls), Arc::clone(&healthy)),
                CircuitBreakerOptions {
                    threshold: 2,
                    timeout: Duration::from_secs(1),
                    reset_timeout: Duration::from_secs(10),
                },
            )
            .expect("valid options");

        assert!(matches!(guarded.call().await, Err(ExecutorError::Failed { .. })));
        assert!(matches!(guarded.call().await, Err(ExecutorError::Failed { .. })));
        assert_eq!(guarded.state(), CircuitState::Open);

        let rejected = guarded.call().await;
        assert!(matches!(rejected, Err(ExecutorError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        clock.advance(Duration::from_secs(10));
        healthy.store(1, Ordering::SeqCst);
        assert_eq!(guarded.call().await.expect("trial succeeds"), "ok");
        assert_eq!(guarded.state(), CircuitState::Closed);
        assert_eq!(guarded.metrics().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_failed_trial_reopens() {
        let clock = MockClock::new();
        let executor = OperationExecutor::new().with_clock(Arc::new(clock.clone()));
        let calls = Arc::new(AtomicU32::new(0));
        let guarded = executor
            .circuit_breaker(
                flaky(Arc::clone(&calls), Arc::new(AtomicU32::new(0))),
                CircuitBreakerOptions { threshold: 1, ..CircuitBreakerOptions::default() },
            )
            .expect("valid options");

        let _ = guarded.call().await;
        clock.advance(CircuitBreakerOptions::default().reset_timeout);
        let _ = guarded.call().await;

        assert_eq!(guarded.state(), CircuitState::Open);
        assert!(matches!(guarded.call().await, Err(ExecutorError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let op = AsyncOperation::new("noop", || async { Ok(()) });
        let result = OperationExecutor::new()
            .circuit_breaker(op, CircuitBreakerOptions { threshold: 0, ..Default::default() });
        assert!(result.is_err());
    }
}
