//! Recovery orchestrator - selects and runs recovery strategies

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use faultline_common::resilience::{Clock, SystemClock};
use faultline_domain::constants::{
    DEFAULT_MAX_RECOVERY_ATTEMPTS, DEFAULT_RECOVERY_WINDOW_SECS, DEFAULT_STRATEGY_ATTEMPTS,
    DEFAULT_STRATEGY_TIMEOUT_MS,
};
use faultline_domain::{
    EscalationChoice, FaultRecord, FaultlineError, RecoveryConfig, RecoveryOutcome,
    RecoveryState, RecoveryStats, Result,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::ports::{RecoveryStateStore, RecoveryStrategy};
use crate::collaborator_ports::EscalationSurface;
use crate::executor::{AsyncOperation, OperationExecutor};

/// Loop-breaker and per-strategy execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySettings {
    pub max_attempts: u32,
    pub window: Duration,
    pub strategy_timeout: Duration,
    /// Total attempts per strategy, including the first
    pub strategy_attempts: u32,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECOVERY_ATTEMPTS,
            window: Duration::from_secs(DEFAULT_RECOVERY_WINDOW_SECS),
            strategy_timeout: Duration::from_millis(DEFAULT_STRATEGY_TIMEOUT_MS),
            strategy_attempts: DEFAULT_STRATEGY_ATTEMPTS,
        }
    }
}

impl From<&RecoveryConfig> for RecoverySettings {
    fn from(config: &RecoveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            window: config.window(),
            strategy_timeout: config.strategy_timeout(),
            strategy_attempts: config.strategy_attempts,
        }
    }
}

/// Holds the strategy registry and the process-wide [`RecoveryState`].
///
/// Strategies are tried one at a time in descending priority (ties keep
/// registration order). A strategy that fails is not retried until the
/// recovery window elapses, and once `max_attempts` calls land inside one
/// window every further call is refused.
pub struct RecoveryOrchestrator {
    strategies: RwLock<Vec<Arc<dyn RecoveryStrategy>>>,
    state: Mutex<RecoveryState>,
    settings: RecoverySettings,
    executor: OperationExecutor,
    state_store: Option<Arc<dyn RecoveryStateStore>>,
    escalation: Option<Arc<dyn EscalationSurface>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RecoveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("strategies", &self.strategy_names())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RecoveryOrchestrator {
    pub fn new(settings: RecoverySettings) -> Self {
        Self {
            strategies: RwLock::new(Vec::new()),
            state: Mutex::new(RecoveryState::default()),
            settings,
            executor: OperationExecutor::new(),
            state_store: None,
            escalation: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Persist the state after every attempt
    pub fn with_state_store(mut self, store: Arc<dyn RecoveryStateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Surface asked for a decision when a critical fault is not recovered
    pub fn with_escalation_surface(mut self, surface: Arc<dyn EscalationSurface>) -> Self {
        self.escalation = Some(surface);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &RecoverySettings {
        &self.settings
    }

    /// Add a strategy. Names must be unique.
    pub fn register(&self, strategy: Arc<dyn RecoveryStrategy>) -> Result<()> {
        let mut strategies = self.strategies.write();
        if strategies.iter().any(|existing| existing.name() == strategy.name()) {
            return Err(FaultlineError::InvalidInput(format!(
                "recovery strategy '{}' is already registered",
                strategy.name()
            )));
        }
        debug!(strategy = strategy.name(), priority = strategy.priority(), "Registered strategy");
        strategies.push(strategy);
        Ok(())
    }

    pub fn register_all<I>(&self, strategies: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn RecoveryStrategy>>,
    {
        strategies.into_iter().try_for_each(|strategy| self.register(strategy))
    }

    /// Remove a strategy by name; returns whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        let mut strategies = self.strategies.write();
        let before = strategies.len();
        strategies.retain(|strategy| strategy.name() != name);
        strategies.len() != before
    }

    /// Registered names in execution order
    pub fn strategy_names(&self) -> Vec<String> {
        self.ordered(|_| true).iter().map(|strategy| strategy.name().to_string()).collect()
    }

    /// Replace the in-memory state with the persisted snapshot, if any
    pub async fn restore_state(&self) -> Result<bool> {
        let Some(store) = &self.state_store else {
            return Ok(false);
        };
        match store.load().await? {
            Some(state) => {
                info!(
                    attempts = state.attempt_count_in_window,
                    failed = state.failed_strategy_names.len(),
                    "Restored recovery state"
                );
                *self.state.lock() = state;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state.lock().clone()
    }

    pub fn stats(&self) -> RecoveryStats {
        let now = self.now();
        let state = self.state.lock();
        RecoveryStats {
            attempts_in_window: state.attempt_count_in_window,
            last_attempt_at: state.last_attempt_at,
            failed_strategies: state.failed_strategy_names.iter().cloned().collect(),
            succeeded_total: state.succeeded_strategy_names.len(),
            strategies: self.strategy_names(),
            loop_breaker_engaged: state.loop_breaker_engaged(
                now,
                self.settings.max_attempts,
                self.settings.window,
            ),
        }
    }

    /// Clear the window (attempt count, failed names, last attempt) and persist
    pub async fn reset_state(&self) {
        {
            let mut state = self.state.lock();
            state.reset_window();
            state.last_attempt_at = None;
        }
        info!("Recovery state reset");
        self.persist().await;
    }

    /// Try matching strategies for `fault`. Never fails.
    #[instrument(
        skip(self, fault),
        fields(fault_id = %fault.id, severity = %fault.severity, source = %fault.source)
    )]
    pub async fn attempt_recovery(&self, fault: &FaultRecord) -> RecoveryOutcome {
        self.attempt(fault, false).await
    }

    /// Re-run recovery for `fault` on an explicit retry decision.
    ///
    /// Strategies that failed earlier in the window become eligible again.
    /// The pass still counts as an attempt, so the loop breaker applies.
    #[instrument(skip(self, fault), fields(fault_id = %fault.id))]
    pub async fn retry_recovery(&self, fault: &FaultRecord) -> RecoveryOutcome {
        self.attempt(fault, true).await
    }

    async fn attempt(&self, fault: &FaultRecord, forget_failures: bool) -> RecoveryOutcome {
        let now = self.now();
        {
            let mut state = self.state.lock();
            if state.loop_breaker_engaged(now, self.settings.max_attempts, self.settings.window) {
                warn!(
                    attempts = state.attempt_count_in_window,
                    "Recovery loop detected, refusing to attempt recovery"
                );
                return RecoveryOutcome::refused();
            }
            if state.window_elapsed(now, self.settings.window) {
                state.reset_window();
            }
            state.record_attempt(now);
            if forget_failures {
                state.failed_strategy_names.clear();
            }
        }

        let fault = Arc::new(fault.clone());
        for strategy in self.ordered(|strategy| strategy.can_recover(&fault)) {
            let name = strategy.name().to_string();
            if self.state.lock().has_failed(&name) {
                debug!(strategy = %name, "Skipping strategy that already failed in this window");
                continue;
            }

            if self.run_strategy(Arc::clone(&strategy), Arc::clone(&fault)).await {
                info!(strategy = %name, "Recovery succeeded");
                self.state.lock().mark_succeeded(&name);
                self.persist().await;
                return RecoveryOutcome::recovered(name);
            }

            warn!(strategy = %name, "Recovery strategy failed");
            self.state.lock().mark_failed(&name);
        }

        self.persist().await;
        let outcome = RecoveryOutcome::failed();
        if fault.severity.is_critical() {
            outcome.with_escalation(self.request_escalation(&fault).await)
        } else {
            outcome
        }
    }

    async fn run_strategy(&self, strategy: Arc<dyn RecoveryStrategy>, fault: Arc<FaultRecord>) -> bool {
        let name = strategy.name().to_string();
        let op = AsyncOperation::new(format!("recovery:{name}"), move || {
            let strategy = Arc::clone(&strategy);
            let fault = Arc::clone(&fault);
            async move { strategy.recover(&fault).await }
        })
        .timeout(self.settings.strategy_timeout)
        .retries(self.settings.strategy_attempts);

        let result = self.executor.execute(op).await;
        if let Some(error) = &result.error {
            debug!(strategy = %name, error = %error, "Strategy did not complete");
        }
        result.data == Some(true)
    }

    async fn request_escalation(&self, fault: &FaultRecord) -> Option<EscalationChoice> {
        let surface = self.escalation.as_ref()?;
        match surface.prompt_choice(fault, &EscalationChoice::ALL).await {
            Ok(choice) => {
                info!(%choice, "Escalation choice received");
                Some(choice)
            }
            Err(err) => {
                warn!(error = %err, "Escalation prompt failed");
                None
            }
        }
    }

    /// Strategies passing `filter`, highest priority first, stable on ties
    fn ordered<F>(&self, filter: F) -> Vec<Arc<dyn RecoveryStrategy>>
    where
        F: Fn(&Arc<dyn RecoveryStrategy>) -> bool,
    {
        let mut selected: Vec<_> =
            self.strategies.read().iter().filter(|s| filter(*s)).cloned().collect();
        selected.sort_by_key(|strategy| Reverse(strategy.priority()));
        selected
    }

    async fn persist(&self) {
        let Some(store) = &self.state_store else {
            return;
        };
        let snapshot = self.state.lock().clone();
        if let Err(err) = store.save(&snapshot).await {
            warn!(error = %err, "Failed to persist recovery state");
        }
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.system_time())
    }
}
