//! Headless escalation surface

use async_trait::async_trait;
use faultline_core::EscalationSurface;
use faultline_domain::{EscalationChoice, FaultRecord, Result};
use tracing::{error, warn};

/// Escalation surface for runs without an interactive user.
///
/// Critical faults are logged at `error`; every prompt is answered with
/// `Ignore`, so an unattended process keeps running.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEscalationSurface;

#[async_trait]
impl EscalationSurface for LogEscalationSurface {
    async fn notify(&self, fault: &FaultRecord) -> Result<()> {
        error!(
            fault_id = %fault.id,
            source = %fault.source,
            message = fault.message(),
            "Critical fault, attempting recovery"
        );
        Ok(())
    }

    async fn prompt_choice(
        &self,
        fault: &FaultRecord,
        options: &[EscalationChoice],
    ) -> Result<EscalationChoice> {
        warn!(
            fault_id = %fault.id,
            options = ?options,
            choice = %EscalationChoice::Ignore,
            "Recovery exhausted, no operator attached"
        );
        Ok(EscalationChoice::Ignore)
    }
}
