//! Fault recorder service - capture, persistence and history queries

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use faultline_common::resilience::{Clock, SystemClock};
use faultline_common::utils::Contained;
use faultline_domain::constants::{CONTEXT_REASON, CONTEXT_SURFACE_ID};
use faultline_domain::{
    FaultContext, FaultError, FaultQuery, FaultRecord, FaultReport, FaultSeverity, FaultSource,
    RecorderConfig, RecoveryOutcome, Result, TimeRange,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::ports::{FaultStore, SystemProbe};
use super::subscribers::{SubscriptionId, Subscribers};
use crate::collaborator_ports::TelemetrySink;
use crate::escalation::EscalationHandler;
use crate::executor::FaultReporter;
use crate::recovery::RecoveryOrchestrator;

/// Captures faults and owns the in-memory fault history.
///
/// Every recorded fault is persisted (best effort), delivered to
/// subscribers, copied to the telemetry sink and then offered to the
/// [`RecoveryOrchestrator`]. Critical faults are announced on the escalation
/// handler before recovery runs.
pub struct FaultRecorder {
    history: Mutex<VecDeque<FaultRecord>>,
    capacity: usize,
    restore_window: Duration,
    session_id: Uuid,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn FaultStore>>,
    probe: Option<Arc<dyn SystemProbe>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    subscribers: Subscribers,
    orchestrator: Arc<RecoveryOrchestrator>,
    escalation: Option<Arc<EscalationHandler>>,
}

impl std::fmt::Debug for FaultRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultRecorder")
            .field("session_id", &self.session_id)
            .field("capacity", &self.capacity)
            .field("history_len", &self.history_len())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl FaultRecorder {
    /// Create a recorder for a new session
    pub fn new(config: &RecorderConfig, orchestrator: Arc<RecoveryOrchestrator>) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(config.history_capacity)),
            capacity: config.history_capacity.max(1),
            restore_window: config.restore_window(),
            session_id: Uuid::new_v4(),
            clock: Arc::new(SystemClock),
            store: None,
            probe: None,
            telemetry: None,
            subscribers: Subscribers::default(),
            orchestrator,
            escalation: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn FaultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_escalation(mut self, escalation: Arc<EscalationHandler>) -> Self {
        self.escalation = Some(escalation);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Identifier of the current process run
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn orchestrator(&self) -> &Arc<RecoveryOrchestrator> {
        &self.orchestrator
    }

    /// Capture a fault and run it through the full lifecycle
    pub async fn record(
        &self,
        error: impl Into<FaultError>,
        severity: FaultSeverity,
        source: FaultSource,
        handled: bool,
        context: Option<FaultContext>,
    ) -> FaultRecord {
        self.record_with_outcome(error, severity, source, handled, context).await.0
    }

    /// [`Self::record`], also returning the recovery outcome
    #[instrument(skip_all, fields(%severity, %source, handled))]
    pub async fn record_with_outcome(
        &self,
        error: impl Into<FaultError>,
        severity: FaultSeverity,
        source: FaultSource,
        handled: bool,
        context: Option<FaultContext>,
    ) -> (FaultRecord, RecoveryOutcome) {
        let record = FaultRecord {
            id: Uuid::now_v7(),
            timestamp: self.now(),
            error: error.into(),
            severity,
            source,
            handled,
            session_id: self.session_id,
            context: context.unwrap_or_default(),
            system_snapshot: self.probe.as_ref().and_then(|probe| probe.snapshot()),
        };
        info!(fault_id = %record.id, message = %record.error.message, "Fault recorded");

        self.insert(record.clone());
        self.persist(&record).await;
        self.subscribers.notify(&record);
        self.forward_to_telemetry(&record);

        if severity.is_critical() {
            if let Some(escalation) = &self.escalation {
                escalation.notify(&record).await;
            }
        }

        let outcome = self.orchestrator.attempt_recovery(&record).await;
        if let (Some(choice), Some(escalation)) = (outcome.escalation, &self.escalation) {
            if let Err(err) = escalation.apply(choice, &record).await {
                error!(fault_id = %record.id, error = %err, "Failed to apply escalation choice");
            }
        }
        (record, outcome)
    }

    /// A presentation surface terminated unexpectedly
    pub async fn surface_terminated(&self, surface_id: &str, reason: &str) -> FaultRecord {
        let mut context = FaultContext::new();
        context.insert(CONTEXT_SURFACE_ID.into(), surface_id.into());
        context.insert(CONTEXT_REASON.into(), reason.into());
        self.record(
            FaultError::new(format!("Surface '{surface_id}' terminated unexpectedly: {reason}"))
                .with_kind("SurfaceTerminated"),
            FaultSeverity::Critical,
            FaultSource::UiSurface,
            false,
            Some(context),
        )
        .await
    }

    /// Register an observer. Delivery is synchronous, in registration order.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&FaultRecord) + Send + Sync + 'static,
    {
        self.subscribers.add(Arc::new(subscriber))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// Matching records, newest first
    pub fn list(&self, query: &FaultQuery) -> Vec<FaultRecord> {
        let history = self.history.lock();
        history
            .iter()
            .rev()
            .filter(|record| query.matches(record))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Aggregate counts over the history, optionally within `range`
    pub fn report(&self, range: Option<TimeRange>) -> FaultReport {
        FaultReport::build(self.history.lock().iter(), range)
    }

    pub fn get(&self, id: Uuid) -> Option<FaultRecord> {
        self.history.lock().iter().find(|record| record.id == id).cloned()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Drop the in-memory history; persisted records are untouched
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Reload persisted records from the restore window into the history.
    /// Returns how many records were added.
    pub async fn restore(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let window = chrono::Duration::from_std(self.restore_window)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let cutoff = self.now() - window;
        let mut records = store.load_since(cutoff).await?;
        records.sort_by_key(|record| record.timestamp);

        let mut added = 0;
        for record in records {
            if self.history.lock().iter().any(|existing| existing.id == record.id) {
                continue;
            }
            self.insert(record);
            added += 1;
        }
        info!(restored = added, since = %cutoff, "Restored fault history");
        Ok(added)
    }

    /// Insert in timestamp order and evict the oldest over capacity
    fn insert(&self, record: FaultRecord) {
        let mut history = self.history.lock();
        let position = history.partition_point(|existing| existing.timestamp <= record.timestamp);
        history.insert(position, record);
        while history.len() > self.capacity {
            if let Some(evicted) = history.pop_front() {
                debug!(fault_id = %evicted.id, "Evicted oldest fault from history");
            }
        }
    }

    async fn persist(&self, record: &FaultRecord) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(record).await {
            warn!(fault_id = %record.id, error = %err, "Failed to persist fault record");
        }
        if let Err(err) = store.append_day_log(record).await {
            warn!(fault_id = %record.id, error = %err, "Failed to append fault day log");
        }
    }

    fn forward_to_telemetry(&self, record: &FaultRecord) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let telemetry = Arc::clone(telemetry);
        let record = record.clone();
        // A panicking sink is not recorded as a new fault
        tokio::spawn(Contained::new(async move {
            let id = record.id;
            if let Err(err) = telemetry.send(record).await {
                debug!(fault_id = %id, error = %err, "Telemetry sink rejected fault");
            }
        }));
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.system_time())
    }
}

#[async_trait]
impl FaultReporter for FaultRecorder {
    async fn report_fault(
        &self,
        error: FaultError,
        severity: FaultSeverity,
        source: FaultSource,
        handled: bool,
        context: FaultContext,
    ) {
        self.record(error, severity, source, handled, Some(context)).await;
    }
}

#[cfg(test)]
mod tests {
    use faultline_common::resilience::MockClock;

    use super::*;
    use crate::recovery::RecoverySettings;

    fn recorder(capacity: usize, clock: &MockClock) -> FaultRecorder {
        let config = RecorderConfig { history_capacity: capacity, ..RecorderConfig::default() };
        FaultRecorder::new(&config, Arc::new(RecoveryOrchestrator::new(RecoverySettings::default())))
            .with_clock(Arc::new(clock.clone()))
    }

    /// Validates bounded history eviction.
    ///
    /// Assertions:
    /// - Only the newest `capacity` records are kept.
    /// - `list` returns them newest first.
    #[tokio::test]
    async fn test_history_evicts_oldest() {
        let clock = MockClock::new();
        let recorder = recorder(3, &clock);

        for i in 0..5 {
            clock.advance(Duration::from_secs(1));
            recorder
                .record(format!("fault {i}"), FaultSeverity::Low, FaultSource::Unknown, true, None)
                .await;
        }

        let messages: Vec<_> =
            recorder.list(&FaultQuery::new()).into_iter().map(|r| r.error.message).collect();
        assert_eq!(messages, vec!["fault 4", "fault 3", "fault 2"]);
        assert_eq!(recorder.history_len(), 3);
    }

    #[tokio::test]
    async fn test_record_assigns_session_and_ids() {
        let clock = MockClock::new();
        let recorder = recorder(10, &clock);

        let a = recorder.record("a", FaultSeverity::Low, FaultSource::Unknown, false, None).await;
        let b = recorder.record("b", FaultSeverity::Low, FaultSource::Unknown, false, None).await;

        assert_ne!(a.id, b.id);
        assert_eq!(a.session_id, recorder.session_id());
        assert_eq!(recorder.get(b.id), Some(b));
    }

    #[tokio::test]
    async fn test_surface_terminated_is_critical_ui_fault() {
        let clock = MockClock::new();
        let recorder = recorder(10, &clock);

        let record = recorder.surface_terminated("main", "crashed").await;

        assert_eq!(record.severity, FaultSeverity::Critical);
        assert_eq!(record.source, FaultSource::UiSurface);
        assert_eq!(record.context_str(CONTEXT_SURFACE_ID), Some("main"));
    }

    /// Validates subscriber delivery and isolation.
    ///
    /// Assertions:
    /// - Subscribers run in registration order.
    /// - A panicking subscriber does not stop later ones.
    /// - Unsubscribed observers receive nothing further.
    #[tokio::test]
    async fn test_subscribers_in_order_and_isolated() {
        let clock = MockClock::new();
        let recorder = recorder(10, &clock);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        let id = recorder.subscribe(move |record| first.lock().push(format!("first:{}", record.message())));
        recorder.subscribe(|record| {
            if record.message() == "explode" {
                panic!("subscriber failure");
            }
        });
        let last = Arc::clone(&seen);
        recorder.subscribe(move |record| last.lock().push(format!("last:{}", record.message())));

        recorder.record("explode", FaultSeverity::Low, FaultSource::Unknown, false, None).await;
        assert!(recorder.unsubscribe(id));
        recorder.record("quiet", FaultSeverity::Low, FaultSource::Unknown, false, None).await;

        assert_eq!(*seen.lock(), vec!["first:explode", "last:explode", "last:quiet"]);
    }
}
