//! Shared test helpers for `faultline-infra` integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use faultline_core::{FaultRecorder, RecoveryOrchestrator, RecoverySettings};
use faultline_domain::{
    FaultContext, FaultError, FaultRecord, FaultSeverity, FaultSource, RecorderConfig,
};
use uuid::Uuid;

pub fn fault_at(message: &str, severity: FaultSeverity, timestamp: DateTime<Utc>) -> FaultRecord {
    FaultRecord {
        id: Uuid::now_v7(),
        timestamp,
        error: FaultError::new(message),
        severity,
        source: FaultSource::Extension,
        handled: false,
        session_id: Uuid::nil(),
        context: FaultContext::new(),
        system_snapshot: None,
    }
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days)
}

/// Recorder with no strategies and no collaborators
pub fn bare_recorder() -> Arc<FaultRecorder> {
    Arc::new(FaultRecorder::new(
        &RecorderConfig::default(),
        Arc::new(RecoveryOrchestrator::new(RecoverySettings::default())),
    ))
}

/// Poll until the recorder holds `count` records or the wait runs out
pub async fn wait_for_history(recorder: &FaultRecorder, count: usize) -> bool {
    for _ in 0..200 {
        if recorder.history_len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
