//! Shared test helpers for `faultline-core` integration tests.
//!
//! In-memory implementations of the storage and collaborator ports plus a
//! scripted recovery strategy that logs every call.

#![allow(dead_code)]

pub mod collaborators;
pub mod stores;
pub mod strategies;

use chrono::{DateTime, Utc};
use faultline_domain::{FaultContext, FaultError, FaultRecord, FaultSeverity, FaultSource};
use uuid::Uuid;

/// Build a standalone fault record for orchestrator tests
pub fn fault(message: &str, severity: FaultSeverity, source: FaultSource) -> FaultRecord {
    fault_at(message, severity, source, Utc::now())
}

pub fn fault_at(
    message: &str,
    severity: FaultSeverity,
    source: FaultSource,
    timestamp: DateTime<Utc>,
) -> FaultRecord {
    FaultRecord {
        id: Uuid::now_v7(),
        timestamp,
        error: FaultError::new(message),
        severity,
        source,
        handled: false,
        session_id: Uuid::nil(),
        context: FaultContext::new(),
        system_snapshot: None,
    }
}
