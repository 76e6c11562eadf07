//! Domain types and models

pub mod fault;
pub mod recovery;
pub mod report;

pub use fault::{FaultContext, FaultError, FaultRecord, FaultSeverity, FaultSource, SystemSnapshot};
pub use recovery::{EscalationChoice, RecoveryOutcome, RecoveryState, RecoveryStats};
pub use report::{FaultQuery, FaultReport, MessageCount, TimeRange};
