//! In-memory storage ports

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use faultline_core::{FaultStore, RecoveryStateStore};
use faultline_domain::{FaultRecord, FaultlineError, RecoveryState, Result};
use parking_lot::Mutex;
use uuid::Uuid;

/// Fault store keeping records and day-log lines in memory
#[derive(Default)]
pub struct MemoryFaultStore {
    records: Mutex<HashMap<Uuid, FaultRecord>>,
    day_log: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
}

impl MemoryFaultStore {
    /// Store seeded with already-persisted records
    pub fn seeded(records: Vec<FaultRecord>) -> Self {
        let store = Self::default();
        store.records.lock().extend(records.into_iter().map(|record| (record.id, record)));
        store
    }

    /// Make every write fail with a storage error
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn saved(&self) -> usize {
        self.records.lock().len()
    }

    pub fn day_log(&self) -> Vec<String> {
        self.day_log.lock().clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FaultlineError::Storage("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FaultStore for MemoryFaultStore {
    async fn save(&self, record: &FaultRecord) -> Result<()> {
        self.check_writable()?;
        self.records.lock().insert(record.id, record.clone());
        Ok(())
    }

    async fn append_day_log(&self, record: &FaultRecord) -> Result<()> {
        self.check_writable()?;
        self.day_log.lock().push(record.day_log_line());
        Ok(())
    }

    async fn load_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<FaultRecord>> {
        Ok(self.records.lock().values().filter(|r| r.timestamp >= cutoff).cloned().collect())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| record.timestamp >= cutoff);
        Ok(before - records.len())
    }
}

/// Recovery state store holding the last saved snapshot
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<RecoveryState>>,
    saves: AtomicUsize,
}

impl MemoryStateStore {
    pub fn with_state(state: RecoveryState) -> Self {
        Self { state: Mutex::new(Some(state)), saves: AtomicUsize::new(0) }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<RecoveryState> {
        self.state.lock().clone()
    }
}

#[async_trait]
impl RecoveryStateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<RecoveryState>> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, state: &RecoveryState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
