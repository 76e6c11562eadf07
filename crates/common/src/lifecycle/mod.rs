//! Resource lifecycle: ordered release of held resources at shutdown.
//!
//! - **[`registry`]**: priority-ordered cleanup callbacks drained within a
//!   global deadline

pub mod registry;

pub use registry::{CleanupFailure, CleanupFuture, DrainReport, LifecycleError, ResourceRegistry};
