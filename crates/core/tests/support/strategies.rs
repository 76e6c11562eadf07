//! Scripted recovery strategy

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use faultline_core::RecoveryStrategy;
use faultline_domain::FaultRecord;
use parking_lot::Mutex;

/// Shared log of strategy invocations, in call order
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Strategy whose predicate and result are fixed up front.
///
/// `matches` filters on a message substring (`None` matches everything).
pub struct ScriptedStrategy {
    name: String,
    priority: i32,
    matches: Option<String>,
    succeed: AtomicBool,
    log: CallLog,
}

impl ScriptedStrategy {
    pub fn new(name: &str, priority: i32, succeed: bool, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            priority,
            matches: None,
            succeed: AtomicBool::new(succeed),
            log: Arc::clone(log),
        })
    }

    pub fn matching(name: &str, priority: i32, needle: &str, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            priority,
            matches: Some(needle.to_string()),
            succeed: AtomicBool::new(true),
            log: Arc::clone(log),
        })
    }

    /// Change the outcome of later calls
    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecoveryStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_recover(&self, fault: &FaultRecord) -> bool {
        self.matches.as_deref().map_or(true, |needle| fault.message().contains(needle))
    }

    async fn recover(&self, _fault: &FaultRecord) -> anyhow::Result<bool> {
        self.log.lock().push(self.name.clone());
        Ok(self.succeed.load(Ordering::SeqCst))
    }
}

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}
