//! Recovery state, outcomes and escalation choices.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Process-wide recovery bookkeeping, owned by the orchestrator.
///
/// The window fields (`attempt_count_in_window`, `failed_strategy_names`)
/// reset once the recovery window has elapsed since `last_attempt_at`;
/// `succeeded_strategy_names` is an append-only log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryState {
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub attempt_count_in_window: u32,
    pub failed_strategy_names: BTreeSet<String>,
    pub succeeded_strategy_names: Vec<String>,
}

impl RecoveryState {
    /// True once `window` has passed since the last attempt (or there was none)
    pub fn window_elapsed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_attempt_at {
            None => true,
            Some(last) => (now - last).to_std().is_ok_and(|since| since >= window),
        }
    }

    /// Recovery-loop breaker: too many attempts inside the current window
    pub fn loop_breaker_engaged(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        window: Duration,
    ) -> bool {
        self.attempt_count_in_window >= max_attempts && !self.window_elapsed(now, window)
    }

    /// Clear the window fields; the success log is kept
    pub fn reset_window(&mut self) {
        self.attempt_count_in_window = 0;
        self.failed_strategy_names.clear();
    }

    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.attempt_count_in_window = self.attempt_count_in_window.saturating_add(1);
        self.last_attempt_at = Some(now);
    }

    pub fn has_failed(&self, strategy: &str) -> bool {
        self.failed_strategy_names.contains(strategy)
    }

    pub fn mark_failed(&mut self, strategy: &str) {
        self.failed_strategy_names.insert(strategy.to_string());
    }

    pub fn mark_succeeded(&mut self, strategy: &str) {
        self.succeeded_strategy_names.push(strategy.to_string());
    }
}

/// Decision requested from the interactive escalation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EscalationChoice {
    Retry,
    ResetToDefaults,
    Ignore,
    Quit,
}

impl_domain_status_conversions!(EscalationChoice {
    Retry => "retry",
    ResetToDefaults => "reset-to-defaults",
    Ignore => "ignore",
    Quit => "quit",
});

impl EscalationChoice {
    /// Options offered when automated recovery of a critical fault is exhausted
    pub const ALL: [Self; 4] = [Self::Retry, Self::ResetToDefaults, Self::Ignore, Self::Quit];
}

/// Result of one `attempt_recovery` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_name: Option<String>,
    /// Refused by the recovery-loop breaker without running any strategy
    #[serde(default)]
    pub refused: bool,
    /// Choice returned by the escalation surface for an unrecovered critical
    /// fault
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationChoice>,
}

impl RecoveryOutcome {
    pub fn recovered(strategy: impl Into<String>) -> Self {
        Self { success: true, strategy_name: Some(strategy.into()), ..Self::default() }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn refused() -> Self {
        Self { refused: true, ..Self::default() }
    }

    pub fn with_escalation(mut self, choice: Option<EscalationChoice>) -> Self {
        self.escalation = choice;
        self
    }
}

/// Read-only view of the orchestrator for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub attempts_in_window: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub failed_strategies: Vec<String>,
    pub succeeded_total: usize,
    /// Registered strategy names in execution order
    pub strategies: Vec<String>,
    pub loop_breaker_engaged: bool,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).single().expect("valid timestamp")
    }

    const WINDOW: Duration = Duration::from_secs(300);

    /// Validates the loop breaker engages at the limit inside the window.
    ///
    /// Assertions:
    /// - Engaged with 5 attempts at 4 minutes.
    /// - Released once the window has elapsed.
    /// - Not engaged below the limit.
    #[test]
    fn test_loop_breaker_window() {
        let mut state = RecoveryState::default();
        for _ in 0..5 {
            state.record_attempt(at(0));
        }

        assert!(state.loop_breaker_engaged(at(240), 5, WINDOW));
        assert!(!state.loop_breaker_engaged(at(300), 5, WINDOW));
        assert!(!state.loop_breaker_engaged(at(10), 6, WINDOW));
    }

    #[test]
    fn test_window_elapsed_without_attempts() {
        assert!(RecoveryState::default().window_elapsed(at(0), WINDOW));
    }

    #[test]
    fn test_clock_going_backwards_is_not_elapsed() {
        let mut state = RecoveryState::default();
        state.record_attempt(at(100));
        assert!(!state.window_elapsed(at(0), WINDOW));
    }

    /// Validates window resets keep the success log.
    ///
    /// Assertions:
    /// - Failed names and attempt count clear.
    /// - Succeeded names survive.
    #[test]
    fn test_reset_window_keeps_success_log() {
        let mut state = RecoveryState::default();
        state.record_attempt(at(0));
        state.mark_failed("server-restart");
        state.mark_succeeded("memory-recovery");

        state.reset_window();

        assert_eq!(state.attempt_count_in_window, 0);
        assert!(!state.has_failed("server-restart"));
        assert_eq!(state.succeeded_strategy_names, vec!["memory-recovery"]);
    }

    #[test]
    fn test_state_deserializes_from_partial_json() {
        let state: RecoveryState =
            serde_json::from_str(r#"{"attempt_count_in_window":2}"#).expect("deserialize");
        assert_eq!(state.attempt_count_in_window, 2);
        assert!(state.last_attempt_at.is_none());
    }

    #[test]
    fn test_escalation_choice_names() {
        assert_eq!(EscalationChoice::ResetToDefaults.to_string(), "reset-to-defaults");
        assert_eq!("quit".parse::<EscalationChoice>(), Ok(EscalationChoice::Quit));
    }
}
