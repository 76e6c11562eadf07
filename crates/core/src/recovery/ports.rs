//! Port interfaces for recovery

use async_trait::async_trait;
use faultline_domain::{FaultRecord, RecoveryState, Result};

/// A named, prioritised remedy for a class of faults.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Unique name, recorded in the recovery state
    fn name(&self) -> &str;

    /// Higher runs first
    fn priority(&self) -> i32;

    /// Applicability predicate. Must not have side effects.
    fn can_recover(&self, fault: &FaultRecord) -> bool;

    /// Perform the remedy. `Ok(false)` and `Err` both count as failure.
    async fn recover(&self, fault: &FaultRecord) -> anyhow::Result<bool>;
}

/// Durable snapshot of the orchestrator's [`RecoveryState`]
#[async_trait]
pub trait RecoveryStateStore: Send + Sync {
    /// Last persisted snapshot, if any
    async fn load(&self) -> Result<Option<RecoveryState>>;

    /// Overwrite the snapshot
    async fn save(&self, state: &RecoveryState) -> Result<()>;
}
