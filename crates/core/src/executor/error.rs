//! Executor error types

use std::time::Duration;

use faultline_common::error::{ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an operation did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorError {
    #[error("operation '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("operation '{operation}' failed: {message}")]
    Failed { operation: String, message: String },

    #[error("operation '{operation}' panicked: {message}")]
    Panicked { operation: String, message: String },

    #[error("circuit open for '{operation}', retry in {retry_in:?}")]
    CircuitOpen { operation: String, retry_in: Duration },

    #[error("batch {batch_index} failed: {message}")]
    BatchFailed { batch_index: usize, message: String },

    #[error("fallback for '{operation}' failed: {message}")]
    FallbackFailed { operation: String, message: String },
}

impl ExecutorError {
    /// Operation name, when the error belongs to a single operation
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Timeout { operation, .. }
            | Self::Failed { operation, .. }
            | Self::Panicked { operation, .. }
            | Self::CircuitOpen { operation, .. }
            | Self::FallbackFailed { operation, .. } => Some(operation),
            Self::BatchFailed { .. } => None,
        }
    }
}

impl ErrorClassification for ExecutorError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Failed { .. } | Self::CircuitOpen { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } | Self::CircuitOpen { .. } => ErrorSeverity::Warning,
            Self::Failed { .. } | Self::BatchFailed { .. } | Self::FallbackFailed { .. } => {
                ErrorSeverity::Error
            }
            Self::Panicked { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}
