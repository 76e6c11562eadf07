//! Port interfaces for the fault recorder

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use faultline_domain::{FaultRecord, Result, SystemSnapshot};

/// Durable fault storage: one record per fault plus a day log
#[async_trait]
pub trait FaultStore: Send + Sync {
    /// Write the structured record, keyed by id
    async fn save(&self, record: &FaultRecord) -> Result<()>;

    /// Append the record's line to the log for its day
    async fn append_day_log(&self, record: &FaultRecord) -> Result<()>;

    /// Records captured at or after `cutoff`, in no particular order
    async fn load_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<FaultRecord>>;

    /// Delete records and day logs older than `cutoff`; returns files removed
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Point-in-time resource usage for diagnostics
pub trait SystemProbe: Send + Sync {
    fn snapshot(&self) -> Option<SystemSnapshot>;
}
