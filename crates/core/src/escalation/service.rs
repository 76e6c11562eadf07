//! Escalation handling for critical faults

use std::sync::Arc;

use faultline_domain::{EscalationChoice, FaultRecord, Result};
use tracing::{info, instrument, warn};

use crate::collaborator_ports::{ConfigStore, EscalationSurface, ProcessControl};
use crate::recovery::RecoveryOrchestrator;

/// Announces critical faults and carries out the decision taken on the
/// escalation surface once automated recovery is exhausted.
pub struct EscalationHandler {
    surface: Arc<dyn EscalationSurface>,
    config_store: Option<Arc<dyn ConfigStore>>,
    process: Option<Arc<dyn ProcessControl>>,
    orchestrator: Arc<RecoveryOrchestrator>,
}

impl EscalationHandler {
    pub fn new(
        surface: Arc<dyn EscalationSurface>,
        orchestrator: Arc<RecoveryOrchestrator>,
    ) -> Self {
        Self { surface, config_store: None, process: None, orchestrator }
    }

    pub fn with_config_store(mut self, config_store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(config_store);
        self
    }

    pub fn with_process_control(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = Some(process);
        self
    }

    /// Tell the surface a critical fault occurred. Failures are logged.
    pub async fn notify(&self, fault: &FaultRecord) {
        if let Err(err) = self.surface.notify(fault).await {
            warn!(fault_id = %fault.id, error = %err, "Escalation notify failed");
        }
    }

    /// Execute `choice` for `fault`.
    ///
    /// `Retry` runs recovery once more with every matching strategy eligible
    /// again, still subject to the loop breaker. If that pass ends in another
    /// decision, a non-retry decision is applied and a second retry is
    /// ignored.
    #[instrument(skip(self, fault), fields(fault_id = %fault.id, %choice))]
    pub async fn apply(&self, choice: EscalationChoice, fault: &FaultRecord) -> Result<()> {
        match choice {
            EscalationChoice::Retry => {
                let outcome = self.orchestrator.retry_recovery(fault).await;
                info!(success = outcome.success, refused = outcome.refused, "Retried recovery");
                match outcome.escalation {
                    Some(EscalationChoice::Retry) | None => Ok(()),
                    Some(next) => self.apply_terminal(next).await,
                }
            }
            other => self.apply_terminal(other).await,
        }
    }

    async fn apply_terminal(&self, choice: EscalationChoice) -> Result<()> {
        match choice {
            EscalationChoice::Retry | EscalationChoice::Ignore => {
                info!("Fault left as is");
                Ok(())
            }
            EscalationChoice::ResetToDefaults => {
                match &self.config_store {
                    Some(store) => store.reset_to_defaults().await?,
                    None => warn!("No configuration store to reset"),
                }
                info!("Configuration reset, restarting");
                self.restart().await
            }
            EscalationChoice::Quit => {
                info!("Quitting on escalation decision");
                match &self.process {
                    Some(process) => process.quit().await,
                    None => {
                        warn!("No process control available to quit");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn restart(&self) -> Result<()> {
        match &self.process {
            Some(process) => process.restart().await,
            None => {
                warn!("No process control available to restart");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for EscalationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationHandler")
            .field("config_store", &self.config_store.is_some())
            .field("process", &self.process.is_some())
            .finish_non_exhaustive()
    }
}
