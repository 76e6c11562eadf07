//! Process-wide capture of panics and failed background tasks.
//!
//! A panic hook runs synchronously on the panicking thread and cannot await,
//! so it only packages the panic and hands it over a channel. A pump task
//! owns the receiving end and feeds each panic into the recorder as a
//! `critical/core-process` fault.
//!
//! Panics raised inside a contained region (executor attempts, subscriber
//! delivery, registry cleanups, supervised tasks) are already turned into
//! results by the code that caught them and are not recorded again.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::future::Future;
use std::sync::Arc;

use faultline_common::{panic_is_contained, panic_message, Contained};
use faultline_core::FaultRecorder;
use faultline_domain::constants::CONTEXT_TASK;
use faultline_domain::{FaultContext, FaultError, FaultSeverity, FaultSource};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

const CONTEXT_LOCATION: &str = "location";
const CONTEXT_THREAD: &str = "thread";

/// A panic captured by the hook, waiting to be recorded
#[derive(Debug)]
struct PanicReport {
    error: FaultError,
    context: FaultContext,
}

/// Install a panic hook that records every uncontained panic as a critical
/// fault.
///
/// The previously installed hook still runs afterwards, so the default
/// stderr output (or any hook installed earlier) is preserved. Must be
/// called from within a Tokio runtime; the returned handle is the pump task,
/// which ends once the hook is replaced and the last sender is dropped.
pub fn install_panic_hook(recorder: Arc<FaultRecorder>) -> JoinHandle<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PanicReport>();

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if panic_is_contained() {
            previous(info);
            return;
        }

        let mut error = FaultError::new(panic_message(info.payload())).with_kind("panic");
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            error = error.with_stack(backtrace.to_string());
        }

        let mut context = FaultContext::new();
        if let Some(location) = info.location() {
            context.insert(
                CONTEXT_LOCATION.into(),
                Value::from(format!("{}:{}:{}", location.file(), location.line(), location.column())),
            );
        }
        if let Some(name) = std::thread::current().name() {
            context.insert(CONTEXT_THREAD.into(), Value::from(name));
        }

        // The pump may already be gone during runtime shutdown
        let _ = tx.send(PanicReport { error, context });
        previous(info);
    }));

    tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            recorder
                .record(
                    report.error,
                    FaultSeverity::Critical,
                    FaultSource::CoreProcess,
                    false,
                    Some(report.context),
                )
                .await;
        }
        debug!("Panic pump stopped");
    })
}

/// Spawn a background task whose failure is recorded instead of lost.
///
/// A returned error or a panic inside `task` becomes a `high/core-process`
/// fault carrying the task name. The outer handle completes after the fault
/// has been recorded. The panic hook leaves a supervised panic to this
/// record.
pub fn spawn_supervised<F>(
    recorder: Arc<FaultRecorder>,
    name: impl Into<String>,
    task: F,
) -> JoinHandle<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let name = name.into();
    tokio::spawn(async move {
        let error = match tokio::spawn(Contained::new(task)).await {
            Ok(Ok(())) => return,
            Ok(Err(err)) => FaultError::from_error(&*err),
            Err(join) if join.is_panic() => {
                FaultError::new(panic_message(&*join.into_panic())).with_kind("panic")
            }
            Err(join) => {
                debug!(task = %name, error = %join, "Supervised task cancelled");
                return;
            }
        };

        error!(task = %name, error = %error, "Supervised task failed");
        let mut context = FaultContext::new();
        context.insert(CONTEXT_TASK.into(), Value::from(name));
        recorder
            .record(error, FaultSeverity::High, FaultSource::CoreProcess, false, Some(context))
            .await;
    })
}
