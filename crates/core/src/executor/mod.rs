//! Operation Executor
//!
//! Runs units of async work under a timeout with retries, linear backoff and
//! an optional fallback. Failures never escape [`OperationExecutor::execute`];
//! they are carried in the returned [`AsyncResult`] and forwarded to an
//! optional [`FaultReporter`].

pub mod breaker;
pub mod error;
pub mod operation;
pub mod ports;
pub mod service;

pub use breaker::{CircuitBreakerOptions, GuardedOperation};
pub use error::ExecutorError;
pub use operation::{AsyncOperation, AsyncResult, RetryEvent};
pub use ports::FaultReporter;
pub use service::{BatchFailure, BatchOptions, BatchOutcome, OperationExecutor, ParallelOptions};
