//! Port interfaces for the executor

use async_trait::async_trait;
use faultline_domain::{FaultContext, FaultError, FaultSeverity, FaultSource};

/// Receiver for failed attempts, normally the fault recorder.
#[async_trait]
pub trait FaultReporter: Send + Sync {
    /// Record a failure. `handled` is true when the executor will still retry
    /// or fall back.
    async fn report_fault(
        &self,
        error: FaultError,
        severity: FaultSeverity,
        source: FaultSource,
        handled: bool,
        context: FaultContext,
    );
}
