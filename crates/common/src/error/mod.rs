//! Common error types shared by Faultline crates
//!
//! - **`CommonError`**: failures raised by the shared primitives and
//!   background services (invalid configuration, persistence, timeouts,
//!   broken invariants).
//! - **`ErrorClassification`**: classifies an error by retryability,
//!   severity and criticality so callers can log and react without matching
//!   on concrete variants. Implemented by `CommonError`, the lifecycle error
//!   and the executor error.
//! - **`ErrorSeverity`**: the severity scale used when logging them.

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Failures raised by the shared primitives and background services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Invalid settings or a call made in the wrong lifecycle state
    Config { message: String, field: Option<String> },

    /// Durable storage could not be read or written
    Persistence { message: String, operation: Option<String> },

    /// An operation did not finish in time
    Timeout { operation: String, duration: Duration },

    /// An invariant was broken, e.g. a background task panicked
    Internal { message: String },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field: Some(field) } => {
                write!(f, "Configuration error in field '{field}': {message}")
            }
            Self::Config { message, field: None } => write!(f, "Configuration error: {message}"),
            Self::Persistence { message, operation: Some(operation) } => {
                write!(f, "Persistence error during '{operation}': {message}")
            }
            Self::Persistence { message, operation: None } => {
                write!(f, "Persistence error: {message}")
            }
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{operation}' timed out after {duration:?}")
            }
            Self::Internal { message } => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Persistence { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Config { .. } | Self::Persistence { .. } => ErrorSeverity::Error,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl CommonError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }
}

/// Uniform classification for error types that reach logs or retry loops
pub trait ErrorClassification {
    /// Transient failures worth another attempt
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Integrity at risk; needs immediate attention
    fn is_critical(&self) -> bool;
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}
