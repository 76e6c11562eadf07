//! Retention sweeper for persisted faults
//!
//! Periodically deletes fault records and day logs older than the configured
//! retention period. Lifecycle is explicit: `start` spawns the loop, `stop`
//! cancels it and awaits the task with a timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use faultline_common::error::{CommonError, CommonResult, ErrorClassification};
use faultline_common::resilience::{Clock, SystemClock};
use faultline_core::FaultStore;
use faultline_domain::RecorderConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Mutex<Option<JoinHandle<()>>>;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Background retention sweeper with lifecycle management
pub struct RetentionService {
    store: Arc<dyn FaultStore>,
    retention: Duration,
    interval: Duration,
    clock: Arc<dyn Clock>,
    cancellation_token: parking_lot::Mutex<CancellationToken>,
    task_handle: TaskHandle,
}

impl RetentionService {
    pub fn new(store: Arc<dyn FaultStore>, retention: Duration) -> Self {
        Self {
            store,
            retention,
            interval: DEFAULT_SWEEP_INTERVAL,
            clock: Arc::new(SystemClock),
            cancellation_token: parking_lot::Mutex::new(CancellationToken::new()),
            task_handle: Mutex::new(None),
        }
    }

    /// Sweeper keeping `retention_days` worth of records
    pub fn from_config(store: Arc<dyn FaultStore>, config: &RecorderConfig) -> Self {
        Self::new(store, config.retention())
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start the sweep loop. The first sweep runs immediately.
    ///
    /// # Errors
    ///
    /// Returns error if the sweeper is already running
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> CommonResult<()> {
        let mut handle = self.task_handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(CommonError::config("Retention sweeper already running"));
        }

        // Fresh token so the sweeper can be restarted after a stop
        let cancel = CancellationToken::new();
        *self.cancellation_token.lock() = cancel.clone();

        let service = Arc::clone(self);
        *handle = Some(tokio::spawn(async move { service.sweep_loop(cancel).await }));

        info!(
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );
        Ok(())
    }

    /// Stop the sweep loop gracefully
    ///
    /// # Errors
    ///
    /// Returns error if the sweeper is not running, panicked, or did not stop
    /// within the timeout
    #[instrument(skip(self))]
    pub async fn stop(&self) -> CommonResult<()> {
        let Some(handle) = self.task_handle.lock().await.take() else {
            return Err(CommonError::config("Retention sweeper not running"));
        };

        self.cancellation_token.lock().cancel();

        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Retention task panicked: {}", e);
                return Err(CommonError::internal(format!("Retention task panicked: {}", e)));
            }
            Err(_) => {
                warn!("Retention task did not complete within timeout");
                return Err(CommonError::timeout("retention_task", STOP_TIMEOUT));
            }
        }

        info!("Retention sweeper stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        let guard = self.task_handle.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one sweep immediately; returns the number of files removed
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the store cannot be scanned
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> CommonResult<usize> {
        let cutoff = self.cutoff();
        let removed = self
            .store
            .purge_older_than(cutoff)
            .await
            .map_err(|e| CommonError::persistence_op("purge_older_than", e.to_string()))?;

        if removed > 0 {
            info!(removed, %cutoff, "Retention sweep removed expired faults");
        } else {
            debug!(%cutoff, "Retention sweep found nothing to remove");
        }
        Ok(removed)
    }

    fn cutoff(&self) -> DateTime<Utc> {
        let now = DateTime::<Utc>::from(self.clock.system_time());
        let retention =
            chrono::Duration::from_std(self.retention).unwrap_or_else(|_| chrono::Duration::zero());
        now - retention
    }

    async fn sweep_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Retention loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(
                            error = %e,
                            severity = %e.severity(),
                            retryable = e.is_retryable(),
                            "Periodic retention sweep failed"
                        );
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for RetentionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionService")
            .field("retention", &self.retention)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
