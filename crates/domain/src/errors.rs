//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Faultline
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FaultlineError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for FaultlineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for Faultline operations
pub type Result<T> = std::result::Result<T, FaultlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_tag_and_content() {
        let err = FaultlineError::Collaborator("service manager unavailable".into());
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["type"], "Collaborator");
        assert_eq!(json["message"], "service manager unavailable");

        let back: FaultlineError = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, err);
    }

    #[test]
    fn test_display_prefixes_category() {
        assert_eq!(
            FaultlineError::Storage("disk full".into()).to_string(),
            "Storage error: disk full"
        );
    }
}
