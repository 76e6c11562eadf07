//! Recording collaborator mocks

use std::sync::Arc;

use async_trait::async_trait;
use faultline_core::{
    ConfigStore, EscalationSurface, FaultReporter, ProcessControl, StoreManager, TelemetrySink,
};
use faultline_domain::{
    EscalationChoice, FaultContext, FaultError, FaultRecord, FaultSeverity, FaultSource, Result,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Collects named calls across every collaborator it implements
#[derive(Default)]
pub struct CallRecorder {
    calls: Mutex<Vec<String>>,
}

impl CallRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn push(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl StoreManager for CallRecorder {
    async fn repair(&self) -> Result<()> {
        self.push("store.repair");
        Ok(())
    }

    async fn initialize(&self) -> Result<()> {
        self.push("store.initialize");
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for CallRecorder {
    async fn snapshot(&self) -> Result<Value> {
        Ok(json!({}))
    }

    async fn reset_to_defaults(&self) -> Result<()> {
        self.push("config.reset");
        Ok(())
    }
}

#[async_trait]
impl ProcessControl for CallRecorder {
    async fn restart(&self) -> Result<()> {
        self.push("process.restart");
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        self.push("process.quit");
        Ok(())
    }
}

/// Escalation surface answering every prompt with a fixed choice
pub struct ScriptedEscalation {
    choice: EscalationChoice,
    events: Mutex<Vec<String>>,
}

impl ScriptedEscalation {
    pub fn answering(choice: EscalationChoice) -> Arc<Self> {
        Arc::new(Self { choice, events: Mutex::new(Vec::new()) })
    }

    /// `notify:<message>` and `prompt:<message>` in call order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EscalationSurface for ScriptedEscalation {
    async fn notify(&self, fault: &FaultRecord) -> Result<()> {
        self.events.lock().push(format!("notify:{}", fault.message()));
        Ok(())
    }

    async fn prompt_choice(
        &self,
        fault: &FaultRecord,
        options: &[EscalationChoice],
    ) -> Result<EscalationChoice> {
        assert_eq!(options, EscalationChoice::ALL.as_slice());
        self.events.lock().push(format!("prompt:{}", fault.message()));
        Ok(self.choice)
    }
}

/// Telemetry sink keeping every record it receives
#[derive(Default)]
pub struct CollectingTelemetry {
    pub records: Mutex<Vec<FaultRecord>>,
}

#[async_trait]
impl TelemetrySink for CollectingTelemetry {
    async fn send(&self, record: FaultRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Reporter capturing `(severity, handled, context)` for executor tests
#[derive(Default)]
pub struct CapturingReporter {
    pub reports: Mutex<Vec<(FaultSeverity, FaultSource, bool, FaultContext)>>,
}

#[async_trait]
impl FaultReporter for CapturingReporter {
    async fn report_fault(
        &self,
        _error: FaultError,
        severity: FaultSeverity,
        source: FaultSource,
        handled: bool,
        context: FaultContext,
    ) {
        self.reports.lock().push((severity, source, handled, context));
    }
}
