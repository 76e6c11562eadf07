//! Panic payload formatting and containment marking.
//!
//! Code that catches its own panics (a `catch_unwind`, or a spawned task
//! whose `JoinError` is inspected) runs the guarded region through
//! [`contain_panics`] or [`Contained`]. A process-wide panic hook checks
//! [`panic_is_contained`] and leaves those panics to the code that handles
//! them.

use std::any::Any;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

thread_local! {
    static CONTAINED_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Extract the message from a panic payload.
///
/// `panic!` with a literal produces `&'static str`; formatted panics produce
/// `String`. Anything else is reported generically.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// True while the current thread runs inside a contained region
pub fn panic_is_contained() -> bool {
    CONTAINED_DEPTH.with(|depth| depth.get() > 0)
}

/// Marks the current thread as contained until dropped. Dropping happens
/// during unwinding, after the panic hook has already run.
struct ContainGuard;

impl ContainGuard {
    fn enter() -> Self {
        CONTAINED_DEPTH.with(|depth| depth.set(depth.get().saturating_add(1)));
        Self
    }
}

impl Drop for ContainGuard {
    fn drop(&mut self) {
        CONTAINED_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `f` with panics marked as handled by the caller
pub fn contain_panics<R>(f: impl FnOnce() -> R) -> R {
    let _guard = ContainGuard::enter();
    f()
}

/// Future whose polls run inside a contained region.
///
/// The marker is thread-local, so it is set around every poll rather than
/// once: a task may resume on a different worker thread.
#[must_use = "futures do nothing unless polled"]
pub struct Contained<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Contained<F> {
    pub fn new(inner: F) -> Self {
        Self { inner: Box::pin(inner) }
    }
}

impl<F: Future> Future for Contained<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _guard = ContainGuard::enter();
        self.inner.as_mut().poll(cx)
    }
}
