//! Integration tests for the recovery orchestrator.
//!
//! Covers strategy ordering, the per-window failed set, the recovery-loop
//! breaker, built-in strategy selection and escalation of critical faults.

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use faultline_common::resilience::MockClock;
use faultline_core::{
    builtin_strategies, Collaborators, EscalationHandler, FaultRecorder, RecoveryOrchestrator,
    RecoverySettings, RecoveryStrategy,
};
use faultline_domain::constants::STRATEGY_DATABASE;
use faultline_domain::{
    EscalationChoice, FaultRecord, FaultSeverity, FaultSource, RecorderConfig, RecoveryConfig,
    RecoveryState,
};
use support::collaborators::{CallRecorder, ScriptedEscalation};
use support::stores::MemoryStateStore;
use support::strategies::{call_log, ScriptedStrategy};
use support::fault;

fn orchestrator_with_clock(clock: &MockClock) -> RecoveryOrchestrator {
    RecoveryOrchestrator::new(RecoverySettings::default()).with_clock(Arc::new(clock.clone()))
}

/// Validates strategies run in strictly descending priority until one
/// succeeds.
///
/// # Test Steps
/// 1. Register priorities 10 (succeeds), 30 and 20 (both fail)
/// 2. Attempt recovery for a matching fault
/// 3. Verify the call order is 30, 20, 10 and the outcome names the winner
#[tokio::test]
async fn test_strategies_run_in_priority_order() {
    let log = call_log();
    let orchestrator = RecoveryOrchestrator::new(RecoverySettings::default());
    orchestrator.register(ScriptedStrategy::new("p10", 10, true, &log)).expect("register");
    orchestrator.register(ScriptedStrategy::new("p30", 30, false, &log)).expect("register");
    orchestrator.register(ScriptedStrategy::new("p20", 20, false, &log)).expect("register");

    let outcome = orchestrator
        .attempt_recovery(&fault("boom", FaultSeverity::Medium, FaultSource::CoreProcess))
        .await;

    assert_eq!(*log.lock(), vec!["p30", "p20", "p10"]);
    assert!(outcome.success);
    assert_eq!(outcome.strategy_name.as_deref(), Some("p10"));
}

/// Validates a failed strategy is skipped for the rest of the window.
///
/// # Test Steps
/// 1. Register a failing high-priority and a succeeding low-priority strategy
/// 2. Recover twice inside the window: the failed one runs only the first time
/// 3. Advance past the window and recover again: the failed one is eligible
#[tokio::test]
async fn test_failed_strategy_not_repeated_within_window() {
    let clock = MockClock::new();
    let log = call_log();
    let orchestrator = orchestrator_with_clock(&clock);
    orchestrator.register(ScriptedStrategy::new("flaky", 20, false, &log)).expect("register");
    orchestrator.register(ScriptedStrategy::new("steady", 10, true, &log)).expect("register");

    let first = fault("first", FaultSeverity::Low, FaultSource::Unknown);
    orchestrator.attempt_recovery(&first).await;
    clock.advance(Duration::from_secs(30));
    orchestrator.attempt_recovery(&fault("second", FaultSeverity::Low, FaultSource::Unknown)).await;
    assert_eq!(*log.lock(), vec!["flaky", "steady", "steady"]);

    clock.advance(Duration::from_secs(5 * 60));
    orchestrator.attempt_recovery(&fault("third", FaultSeverity::Low, FaultSource::Unknown)).await;
    assert_eq!(*log.lock(), vec!["flaky", "steady", "steady", "flaky", "steady"]);
}

/// Validates the recovery-loop breaker.
///
/// # Test Steps
/// 1. Call `attempt_recovery` six times, ten seconds apart
/// 2. Verify calls 1-5 run the strategy and call 6 is refused untouched
/// 3. Advance past the window and verify recovery runs again
#[tokio::test]
async fn test_loop_breaker_refuses_sixth_attempt() {
    let clock = MockClock::new();
    let log = call_log();
    let orchestrator = orchestrator_with_clock(&clock);
    orchestrator.register(ScriptedStrategy::new("steady", 10, true, &log)).expect("register");

    let mut outcomes = Vec::new();
    for i in 0..6 {
        clock.advance(Duration::from_secs(10));
        let fault = fault(&format!("fault {i}"), FaultSeverity::Low, FaultSource::Unknown);
        outcomes.push(orchestrator.attempt_recovery(&fault).await);
    }

    assert!(outcomes[..5].iter().all(|outcome| outcome.success));
    assert!(!outcomes[5].success);
    assert!(outcomes[5].refused);
    assert!(outcomes[5].strategy_name.is_none());
    assert_eq!(log.lock().len(), 5);
    assert!(orchestrator.stats().loop_breaker_engaged);
    assert_eq!(orchestrator.stats().attempts_in_window, 5);

    clock.advance(Duration::from_secs(5 * 60));
    let outcome =
        orchestrator.attempt_recovery(&fault("later", FaultSeverity::Low, FaultSource::Unknown)).await;
    assert!(outcome.success);
    assert_eq!(log.lock().len(), 6);
    assert_eq!(orchestrator.stats().attempts_in_window, 1);
}

/// Validates the built-in store repair strategy end to end.
///
/// # Test Steps
/// 1. Build built-ins with only a store collaborator
/// 2. Record "SQLITE_CORRUPT: disk I/O error" from the core process
/// 3. Verify recovery succeeds via database recovery (repair, then initialize)
#[tokio::test]
async fn test_store_corruption_recovered_by_database_strategy() {
    let store = CallRecorder::new();
    let orchestrator = Arc::new(RecoveryOrchestrator::new(RecoverySettings::default()));
    orchestrator
        .register_all(
            builtin_strategies(
                &Collaborators::new().with_store(store.clone()),
                &RecoveryConfig::default(),
            )
            .expect("built-ins"),
        )
        .expect("register");
    let recorder = FaultRecorder::new(&RecorderConfig::default(), Arc::clone(&orchestrator));

    let (_, outcome) = recorder
        .record_with_outcome(
            "SQLITE_CORRUPT: disk I/O error",
            FaultSeverity::High,
            FaultSource::CoreProcess,
            false,
            None,
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy_name.as_deref(), Some(STRATEGY_DATABASE));
    assert_eq!(store.calls(), vec!["store.repair", "store.initialize"]);
}

struct Stalls;

#[async_trait]
impl RecoveryStrategy for Stalls {
    fn name(&self) -> &str {
        "stalls"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn can_recover(&self, _fault: &FaultRecord) -> bool {
        true
    }

    async fn recover(&self, _fault: &FaultRecord) -> anyhow::Result<bool> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(true)
    }
}

/// Validates a strategy exceeding its timeout counts as failed.
///
/// # Test Steps
/// 1. Register a strategy that never finishes within the 30s timeout
/// 2. Attempt recovery under paused time
/// 3. Verify failure and that the strategy is in the failed set
#[tokio::test(start_paused = true)]
async fn test_strategy_timeout_marks_failed() {
    let orchestrator = RecoveryOrchestrator::new(RecoverySettings::default());
    orchestrator.register(Arc::new(Stalls)).expect("register");

    let outcome = orchestrator
        .attempt_recovery(&fault("hang", FaultSeverity::Low, FaultSource::Unknown))
        .await;

    assert!(!outcome.success);
    assert_eq!(orchestrator.stats().failed_strategies, vec!["stalls"]);
}

/// Validates state persistence and restore.
///
/// # Test Steps
/// 1. Restore a snapshot with five recent attempts
/// 2. Verify the next attempt is refused
/// 3. Verify every non-refused attempt saves the state
#[tokio::test]
async fn test_state_restored_and_persisted() {
    let clock = MockClock::new();
    let now = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
    let saved = RecoveryState {
        last_attempt_at: Some(now),
        attempt_count_in_window: 5,
        ..RecoveryState::default()
    };
    let store = Arc::new(MemoryStateStore::with_state(saved));
    let log = call_log();
    let orchestrator = orchestrator_with_clock(&clock).with_state_store(store.clone());
    orchestrator.register(ScriptedStrategy::new("steady", 10, true, &log)).expect("register");

    assert!(orchestrator.restore_state().await.expect("load"));
    let refused =
        orchestrator.attempt_recovery(&fault("x", FaultSeverity::Low, FaultSource::Unknown)).await;
    assert!(refused.refused);
    assert_eq!(store.saves(), 0);

    clock.advance(Duration::from_secs(301));
    let outcome =
        orchestrator.attempt_recovery(&fault("y", FaultSeverity::Low, FaultSource::Unknown)).await;
    assert!(outcome.success);
    assert_eq!(store.saves(), 1);
    let persisted = store.last().expect("saved state");
    assert_eq!(persisted.attempt_count_in_window, 1);
    assert_eq!(persisted.succeeded_strategy_names, vec!["steady"]);
}

fn escalating_recorder(
    choice: EscalationChoice,
    log: &support::strategies::CallLog,
) -> (FaultRecorder, Arc<ScriptedEscalation>, Arc<CallRecorder>) {
    let surface = ScriptedEscalation::answering(choice);
    let collaborators = CallRecorder::new();
    let orchestrator = Arc::new(
        RecoveryOrchestrator::new(RecoverySettings::default())
            .with_escalation_surface(surface.clone()),
    );
    orchestrator.register(ScriptedStrategy::new("broken", 10, false, log)).expect("register");
    let handler = EscalationHandler::new(surface.clone(), Arc::clone(&orchestrator))
        .with_config_store(collaborators.clone())
        .with_process_control(collaborators.clone());
    let recorder = FaultRecorder::new(&RecorderConfig::default(), orchestrator)
        .with_escalation(Arc::new(handler));
    (recorder, surface, collaborators)
}

/// Validates escalation of an unrecovered critical fault.
///
/// # Test Steps
/// 1. Record a critical fault that no strategy can fix
/// 2. Verify the surface is notified before the prompt
/// 3. Verify the reset choice resets configuration then restarts
#[tokio::test]
async fn test_critical_fault_escalates_and_applies_reset() {
    let log = call_log();
    let (recorder, surface, collaborators) =
        escalating_recorder(EscalationChoice::ResetToDefaults, &log);

    let (_, outcome) = recorder
        .record_with_outcome("fatal", FaultSeverity::Critical, FaultSource::CoreProcess, false, None)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.escalation, Some(EscalationChoice::ResetToDefaults));
    assert_eq!(surface.events(), vec!["notify:fatal", "prompt:fatal"]);
    assert_eq!(collaborators.calls(), vec!["config.reset", "process.restart"]);
}

#[tokio::test]
async fn test_quit_choice_quits_process() {
    let log = call_log();
    let (recorder, _, collaborators) = escalating_recorder(EscalationChoice::Quit, &log);

    recorder.record("fatal", FaultSeverity::Critical, FaultSource::CoreProcess, false, None).await;

    assert_eq!(collaborators.calls(), vec!["process.quit"]);
}

/// Validates non-critical faults never reach the escalation surface.
///
/// # Test Steps
/// 1. Record a high-severity fault that no strategy can fix
/// 2. Verify there is no notify and no prompt
#[tokio::test]
async fn test_non_critical_fault_not_escalated() {
    let log = call_log();
    let (recorder, surface, collaborators) = escalating_recorder(EscalationChoice::Quit, &log);

    let (_, outcome) = recorder
        .record_with_outcome("bad", FaultSeverity::High, FaultSource::CoreProcess, false, None)
        .await;

    assert!(outcome.escalation.is_none());
    assert!(surface.events().is_empty());
    assert!(collaborators.calls().is_empty());
}

/// Validates a retry choice re-runs recovery once.
///
/// # Test Steps
/// 1. Answer every prompt with retry
/// 2. Record a critical fault
/// 3. Verify the second pass runs the failed strategy again and prompts
///    again without looping further
#[tokio::test]
async fn test_retry_choice_runs_recovery_again() {
    let log = call_log();
    let (recorder, surface, _) = escalating_recorder(EscalationChoice::Retry, &log);

    recorder.record("fatal", FaultSeverity::Critical, FaultSource::CoreProcess, false, None).await;

    assert_eq!(*log.lock(), vec!["broken", "broken"]);
    assert_eq!(surface.events(), vec!["notify:fatal", "prompt:fatal", "prompt:fatal"]);
    assert_eq!(recorder.orchestrator().stats().attempts_in_window, 2);
}

/// Validates an explicit retry makes failed strategies eligible again.
///
/// # Test Steps
/// 1. Fail a strategy, then let it succeed on later calls
/// 2. Verify a plain attempt in the same window still skips it
/// 3. Verify a retry runs it and recovers
/// 4. Verify the retry counted toward the loop breaker, which then refuses
///    a further retry
#[tokio::test]
async fn test_retry_recovery_forgets_failures_but_respects_breaker() {
    let log = call_log();
    let orchestrator = RecoveryOrchestrator::new(RecoverySettings {
        max_attempts: 3,
        ..RecoverySettings::default()
    });
    let strategy = ScriptedStrategy::new("flaky", 10, false, &log);
    orchestrator.register(strategy.clone()).expect("register");
    let fault = fault("worker stalled", FaultSeverity::High, FaultSource::CoreProcess);

    assert!(!orchestrator.attempt_recovery(&fault).await.success);
    strategy.set_succeed(true);

    assert!(!orchestrator.attempt_recovery(&fault).await.success);
    assert_eq!(*log.lock(), vec!["flaky"]);

    let outcome = orchestrator.retry_recovery(&fault).await;
    assert!(outcome.success);
    assert_eq!(outcome.strategy_name.as_deref(), Some("flaky"));
    assert_eq!(*log.lock(), vec!["flaky", "flaky"]);
    assert_eq!(orchestrator.stats().attempts_in_window, 3);

    assert!(orchestrator.retry_recovery(&fault).await.refused);
    assert_eq!(log.lock().len(), 2);
}
