//! # Faultline Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - File-backed fault store and recovery-state store
//! - `sysinfo` process probe
//! - Process-wide panic hook and supervised task spawning
//! - Retention sweeper for persisted faults
//! - Configuration loading and tracing initialisation
//!
//! ## Architecture
//! - Implements traits defined in `faultline-core`
//! - Contains all "impure" code (filesystem, process-global hooks)

pub mod config;
pub mod errors;
pub mod hooks;
pub mod logging;
pub mod probe;
pub mod retention;
pub mod storage;
pub mod telemetry;

// Re-export commonly used items
pub use errors::InfraError;
pub use hooks::{install_panic_hook, spawn_supervised};
pub use logging::init_tracing;
pub use probe::SysinfoProbe;
pub use retention::RetentionService;
pub use storage::{FileFaultStore, FileRecoveryStateStore};
pub use telemetry::LogTelemetrySink;
