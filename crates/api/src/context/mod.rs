//! Application context - dependency injection container

use std::sync::Arc;

use faultline_common::lifecycle::{DrainReport, LifecycleError, ResourceRegistry};
use faultline_core::{
    builtin_strategies, Collaborators, EscalationHandler, EscalationSurface, FaultRecorder,
    OperationExecutor, RecoveryOrchestrator, RecoverySettings,
};
use faultline_domain::{Config, FaultlineError, Result};
use faultline_infra::{
    FileFaultStore, FileRecoveryStateStore, LogTelemetrySink, RetentionService, SysinfoProbe,
};
use tracing::{info, warn};

use crate::adapters::{AppConfigStore, LogEscalationSurface, ShutdownSignal};

/// Cleanup priorities; higher runs first during the drain
const PRIORITY_RETENTION: i32 = 100;
const PRIORITY_FAULT_SUMMARY: i32 = 0;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub recorder: Arc<FaultRecorder>,
    pub orchestrator: Arc<RecoveryOrchestrator>,
    pub executor: OperationExecutor,
    pub registry: Arc<ResourceRegistry>,
    pub retention: Arc<RetentionService>,
    pub config_store: Arc<AppConfigStore>,
    pub signal: Arc<ShutdownSignal>,
}

impl AppContext {
    /// Build every service from `config`. Nothing is started and nothing is
    /// read from disk yet; see [`AppContext::start`].
    ///
    /// # Errors
    /// Returns an error if the built-in strategies cannot be assembled.
    pub fn new(config: Config) -> Result<Self> {
        let fault_store = Arc::new(FileFaultStore::from_config(&config.storage));
        let state_store = Arc::new(FileRecoveryStateStore::from_config(&config.storage));
        let surface: Arc<dyn EscalationSurface> = Arc::new(LogEscalationSurface);
        let config_store = Arc::new(AppConfigStore::new(config.clone()));
        let signal = Arc::new(ShutdownSignal::new());

        let orchestrator = Arc::new(
            RecoveryOrchestrator::new(RecoverySettings::from(&config.recovery))
                .with_state_store(state_store)
                .with_escalation_surface(Arc::clone(&surface)),
        );
        let collaborators = Collaborators::new().with_config(config_store.clone());
        orchestrator.register_all(builtin_strategies(&collaborators, &config.recovery)?)?;

        let escalation = EscalationHandler::new(surface, Arc::clone(&orchestrator))
            .with_config_store(config_store.clone())
            .with_process_control(signal.clone());

        let recorder = Arc::new(
            FaultRecorder::new(&config.recorder, Arc::clone(&orchestrator))
                .with_store(fault_store.clone())
                .with_probe(Arc::new(SysinfoProbe::new()))
                .with_telemetry(Arc::new(LogTelemetrySink))
                .with_escalation(Arc::new(escalation)),
        );

        let executor = OperationExecutor::new()
            .with_reporter(recorder.clone())
            .with_defaults(config.executor.clone());

        let retention = Arc::new(RetentionService::from_config(fault_store, &config.recorder));

        Ok(Self {
            config,
            recorder,
            orchestrator,
            executor,
            registry: Arc::new(ResourceRegistry::new()),
            retention,
            config_store,
            signal,
        })
    }

    /// Restore persisted history and recovery state, start the retention
    /// sweeper and register the shutdown cleanups.
    ///
    /// Unreadable persisted data is logged and skipped; the process starts
    /// with an empty history rather than not at all.
    ///
    /// # Errors
    /// Returns an error if the retention sweeper cannot be started.
    pub async fn start(&self) -> Result<()> {
        match self.recorder.restore().await {
            Ok(restored) => info!(restored, "Fault history restored"),
            Err(e) => warn!(error = %e, "Failed to restore fault history"),
        }
        match self.orchestrator.restore_state().await {
            Ok(found) => info!(found, "Recovery state restored"),
            Err(e) => warn!(error = %e, "Failed to restore recovery state"),
        }

        self.retention
            .start()
            .await
            .map_err(|e| FaultlineError::Internal(format!("retention sweeper: {e}")))?;

        let retention = Arc::clone(&self.retention);
        self.registry.register("retention-sweeper", PRIORITY_RETENTION, move || async move {
            retention.stop().await.map_err(Into::into)
        });

        let recorder = Arc::clone(&self.recorder);
        self.registry.register("fault-summary", PRIORITY_FAULT_SUMMARY, move || async move {
            let report = recorder.report(None);
            info!(
                total = report.total,
                session_id = %recorder.session_id(),
                top = ?report.top_messages.first().map(|m| &m.message),
                "Session fault summary"
            );
            Ok(())
        });

        info!(
            strategies = ?self.orchestrator.strategy_names(),
            cleanups = self.registry.len(),
            "Faultline started"
        );
        Ok(())
    }

    /// Drain every registered cleanup within the configured deadline
    ///
    /// # Errors
    /// Returns [`LifecycleError::DuplicateDrain`] if a drain is already running.
    pub async fn shutdown(&self) -> std::result::Result<DrainReport, LifecycleError> {
        let report = self.registry.drain_all(self.config.shutdown.deadline()).await?;
        if report.is_clean() {
            info!(completed = report.completed.len(), elapsed = ?report.elapsed, "Shutdown drained");
        } else {
            warn!(
                failed = report.failed.len(),
                interrupted = ?report.interrupted,
                skipped = report.skipped.len(),
                "Shutdown drain incomplete"
            );
        }
        Ok(report)
    }
}
