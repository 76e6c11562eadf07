//! # Faultline Core
//!
//! Fault lifecycle logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The Operation Executor (timeout, retry, fallback, parallel, batch,
//!   circuit breaking)
//! - The Fault Recorder (capture, bounded history, queries, subscribers)
//! - The Recovery Orchestrator and its built-in strategies
//! - Escalation handling for unrecovered critical faults
//! - Port interfaces (traits) for storage and external collaborators
//!
//! ## Architecture Principles
//! - Only depends on `faultline-common` and `faultline-domain`
//! - No filesystem, process-global or platform code
//! - All external dependencies via traits
//! - Time flows through the `Clock` abstraction

pub mod collaborator_ports;
pub mod escalation;
pub mod executor;
pub mod recorder;
pub mod recovery;

// Re-export specific items to avoid ambiguity
pub use collaborator_ports::{
    CacheManager, ConfigStore, EscalationSurface, ExtensionManager, ProcessControl,
    ServiceManager, StoreManager, SurfaceManager, TelemetrySink,
};
pub use escalation::EscalationHandler;
pub use executor::{
    AsyncOperation, AsyncResult, BatchOptions, BatchOutcome, CircuitBreakerOptions,
    ExecutorError, FaultReporter, GuardedOperation, OperationExecutor, ParallelOptions,
};
pub use recorder::ports::{FaultStore, SystemProbe};
pub use recorder::{FaultRecorder, SubscriptionId};
pub use recovery::ports::{RecoveryStateStore, RecoveryStrategy};
pub use recovery::strategies::{builtin_strategies, Collaborators};
pub use recovery::{RecoveryOrchestrator, RecoverySettings};
