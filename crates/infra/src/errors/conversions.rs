//! Conversions from external infrastructure errors into domain errors.

use std::io::{Error as IoError, ErrorKind};
use std::path::Path;

use faultline_common::panic_message;
use faultline_domain::FaultlineError;
use serde_json::Error as JsonError;
use tokio::task::JoinError;
use toml::de::Error as TomlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FaultlineError);

impl InfraError {
    /// I/O failure on a specific path; the path is kept in the message
    pub fn io_at(path: &Path, err: IoError) -> Self {
        let InfraError(inner) = InfraError::from(err);
        InfraError(match inner {
            FaultlineError::NotFound(message) => {
                FaultlineError::NotFound(format!("{}: {message}", path.display()))
            }
            FaultlineError::Storage(message) => {
                FaultlineError::Storage(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }
}

impl From<InfraError> for FaultlineError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FaultlineError> for InfraError {
    fn from(value: FaultlineError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoFaultlineError {
    fn into_faultline(self) -> FaultlineError;
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → FaultlineError */
/* -------------------------------------------------------------------------- */

impl IntoFaultlineError for IoError {
    fn into_faultline(self) -> FaultlineError {
        match self.kind() {
            ErrorKind::NotFound => FaultlineError::NotFound("file not found".into()),
            ErrorKind::PermissionDenied => FaultlineError::Storage("permission denied".into()),
            ErrorKind::InvalidData => FaultlineError::Serialization(self.to_string()),
            _ => FaultlineError::Storage(self.to_string()),
        }
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_faultline())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → FaultlineError */
/* -------------------------------------------------------------------------- */

impl IntoFaultlineError for JsonError {
    fn into_faultline(self) -> FaultlineError {
        if self.is_io() {
            return FaultlineError::Storage(self.to_string());
        }
        let kind = if self.is_eof() {
            "truncated JSON"
        } else if self.is_syntax() {
            "malformed JSON"
        } else {
            "unexpected JSON shape"
        };
        FaultlineError::Serialization(format!(
            "{kind} at line {} column {}: {self}",
            self.line(),
            self.column()
        ))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_faultline())
    }
}

/* -------------------------------------------------------------------------- */
/* toml::de::Error → FaultlineError */
/* -------------------------------------------------------------------------- */

impl IntoFaultlineError for TomlError {
    fn into_faultline(self) -> FaultlineError {
        FaultlineError::Config(format!("Invalid TOML format: {}", self.message()))
    }
}

impl From<TomlError> for InfraError {
    fn from(value: TomlError) -> Self {
        InfraError(value.into_faultline())
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → FaultlineError */
/* -------------------------------------------------------------------------- */

impl IntoFaultlineError for JoinError {
    fn into_faultline(self) -> FaultlineError {
        if self.is_cancelled() {
            return FaultlineError::Internal("task was cancelled".into());
        }
        match self.try_into_panic() {
            Ok(payload) => {
                FaultlineError::Internal(format!("task panicked: {}", panic_message(&*payload)))
            }
            Err(err) => FaultlineError::Internal(format!("task join failed: {err}")),
        }
    }
}

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        InfraError(value.into_faultline())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
