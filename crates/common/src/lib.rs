//! Modular common utilities shared across Faultline crates.
//!
//! # Safety and Quality
//!
//! This crate enforces strict safety and quality standards to ensure
//! reliability across all Faultline components.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors and serde utilities
//! - `runtime`: async infrastructure (resilience primitives, resource
//!   lifecycle)
//! - `observability`: optional tracing (implied by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod lifecycle;
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use lifecycle::{CleanupFailure, DrainReport, LifecycleError, ResourceRegistry};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, BoxedError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitState, Clock, MockClock, ResilienceError, ResilienceResult, SystemClock,
};
#[cfg(feature = "foundation")]
pub use utils::{contain_panics, duration_millis, panic_is_contained, panic_message, Contained};
