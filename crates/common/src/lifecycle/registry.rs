//! Priority-ordered table of cleanup callbacks.
//!
//! Entries drain highest priority first, ties in registration order. A drain
//! runs each callback once on its own task, collects failures instead of
//! stopping, and races the whole pass against one deadline. The table is
//! empty afterwards whether or not the deadline fired.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorClassification, ErrorSeverity};
use crate::resilience::BoxedError;
use crate::utils::serde::duration_millis;
use crate::utils::Contained;

/// Future returned by a cleanup callback
pub type CleanupFuture = BoxFuture<'static, Result<(), BoxedError>>;

type CleanupFn = Box<dyn FnOnce() -> CleanupFuture + Send>;

/// Errors raised by the registry itself
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A drain pass is already running
    #[error("a drain pass is already in progress")]
    DuplicateDrain,

    /// A single cleanup callback failed
    #[error("cleanup '{id}' failed: {message}")]
    CleanupFailed {
        /// Entry id
        id: String,
        /// Failure description
        message: String,
    },

    /// The drain deadline fired before every entry ran
    #[error("drain deadline of {deadline:?} exceeded with {remaining} entries not run")]
    DeadlineExceeded {
        /// Deadline that fired
        deadline: Duration,
        /// Entries interrupted or never started
        remaining: usize,
    },
}

impl ErrorClassification for LifecycleError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::DuplicateDrain)
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DuplicateDrain => ErrorSeverity::Warning,
            Self::CleanupFailed { .. } | Self::DeadlineExceeded { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }
}

/// A callback that returned an error or panicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    /// Entry id
    pub id: String,
    /// Error or panic description
    pub message: String,
}

/// Outcome of [`ResourceRegistry::drain_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Entries whose callback returned `Ok`, in execution order
    pub completed: Vec<String>,
    /// Entries whose callback returned an error or panicked
    pub failed: Vec<CleanupFailure>,
    /// Entry still running when the deadline fired; it is abandoned
    pub interrupted: Option<String>,
    /// Entries never started because the deadline fired
    pub skipped: Vec<String>,
    /// Whether the deadline fired
    pub timed_out: bool,
    /// Wall time of the pass
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl DrainReport {
    /// Every entry ran and succeeded
    pub fn is_clean(&self) -> bool {
        !self.timed_out && self.failed.is_empty()
    }

    /// Convert a timed out or failed pass into an error
    pub fn ensure_clean(&self, deadline: Duration) -> Result<(), LifecycleError> {
        if self.timed_out {
            let remaining = self.skipped.len() + usize::from(self.interrupted.is_some());
            return Err(LifecycleError::DeadlineExceeded { deadline, remaining });
        }
        match self.failed.first() {
            Some(failure) => Err(LifecycleError::CleanupFailed {
                id: failure.id.clone(),
                message: failure.message.clone(),
            }),
            None => Ok(()),
        }
    }
}

struct CleanupEntry {
    id: String,
    priority: i32,
    callback: CleanupFn,
}

/// Clears the draining flag even when the drain future is dropped
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Registry of cleanup callbacks keyed by id
#[derive(Default)]
pub struct ResourceRegistry {
    entries: Mutex<Vec<CleanupEntry>>,
    registrations: AtomicU64,
    draining: AtomicBool,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("entries", &self.ids())
            .field("draining", &self.draining.load(Ordering::Acquire))
            .finish()
    }
}

impl ResourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleanup callback.
    ///
    /// An existing entry with the same id is replaced; the replacement takes
    /// its position from the new priority and counts as the latest
    /// registration among equals.
    pub fn register<F, Fut>(&self, id: impl Into<String>, priority: i32, cleanup: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxedError>> + Send + 'static,
    {
        let id = id.into();
        let callback: CleanupFn = Box::new(move || cleanup().boxed());
        self.registrations.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.lock();
        if let Some(pos) = entries.iter().position(|e| e.id == id) {
            entries.remove(pos);
            debug!(%id, "Replacing cleanup entry");
        }
        let insert_at = entries.partition_point(|e| e.priority >= priority);
        entries.insert(insert_at, CleanupEntry { id, priority, callback });
    }

    /// Remove an entry without running it
    pub fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Whether an entry with `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().iter().any(|e| e.id == id)
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Pending ids in drain order
    pub fn ids(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.id.clone()).collect()
    }

    /// Total registrations over the registry's lifetime
    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    /// Run a single entry now and remove it.
    ///
    /// Returns `Ok(false)` when no entry has that id.
    #[instrument(skip(self))]
    pub async fn cleanup_resource(&self, id: &str) -> Result<bool, LifecycleError> {
        let entry = {
            let mut entries = self.entries.lock();
            entries.iter().position(|e| e.id == id).map(|pos| entries.remove(pos))
        };
        let Some(entry) = entry else {
            return Ok(false);
        };

        match run_entry(entry.callback).await {
            Ok(()) => {
                debug!(%id, "Cleanup completed");
                Ok(true)
            }
            Err(message) => {
                warn!(%id, %message, "Cleanup failed");
                Err(LifecycleError::CleanupFailed { id: id.to_string(), message })
            }
        }
    }

    /// Drain every entry in priority order within `deadline`.
    ///
    /// Failures are collected and the pass continues. When the deadline fires
    /// the running callback is abandoned and the rest are reported as
    /// skipped. A second concurrent call fails with
    /// [`LifecycleError::DuplicateDrain`].
    #[instrument(skip(self), fields(entries = self.len()))]
    pub async fn drain_all(&self, deadline: Duration) -> Result<DrainReport, LifecycleError> {
        if self.draining.swap(true, Ordering::AcqRel) {
            return Err(LifecycleError::DuplicateDrain);
        }
        let _guard = DrainGuard(&self.draining);

        let started = tokio::time::Instant::now();
        // A deadline past the clock's range means no deadline
        let deadline_at = started.checked_add(deadline);
        let entries = std::mem::take(&mut *self.entries.lock());
        let mut report = DrainReport::default();

        let mut pending = entries.into_iter();
        while let Some(entry) = pending.next() {
            let outcome = match deadline_at {
                Some(at) => tokio::time::timeout_at(at, run_entry(entry.callback)).await,
                None => Ok(run_entry(entry.callback).await),
            };
            match outcome {
                Ok(Ok(())) => report.completed.push(entry.id),
                Ok(Err(message)) => {
                    warn!(id = %entry.id, %message, "Cleanup failed during drain");
                    report.failed.push(CleanupFailure { id: entry.id, message });
                }
                Err(_) => {
                    warn!(id = %entry.id, ?deadline, "Drain deadline exceeded");
                    report.timed_out = true;
                    report.interrupted = Some(entry.id);
                    report.skipped.extend(pending.by_ref().map(|e| e.id));
                    break;
                }
            }
        }

        let late = std::mem::take(&mut *self.entries.lock()).len();
        if late > 0 {
            warn!(late, "Dropping entries registered during drain");
        }

        report.elapsed = started.elapsed();
        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            timed_out = report.timed_out,
            "Resource drain finished"
        );
        Ok(report)
    }
}

/// Run a callback on its own task so a panic is reported as a failure and a
/// timed out callback keeps running detached.
async fn run_entry(callback: CleanupFn) -> Result<(), String> {
    match tokio::spawn(Contained::new(callback())).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(join) if join.is_panic() => Err("cleanup callback panicked".to_string()),
        Err(join) => Err(join.to_string()),
    }
}
