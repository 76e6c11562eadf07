//! Resilience primitives shared across Faultline crates.
//!
//! - [`CircuitBreaker`]: stops calling an operation after repeated failures
//!   and probes it again with a single trial call.
//! - [`BackoffStrategy`]: delay schedules between retry attempts.
//! - [`Clock`]: time abstraction; [`MockClock`] makes window and timeout
//!   logic testable without sleeping.

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;

pub use backoff::BackoffStrategy;
pub use circuit_breaker::{
    BoxedError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitState, ResilienceError, ResilienceResult,
};
pub use clock::{Clock, MockClock, SystemClock};
