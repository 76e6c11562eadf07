//! # Faultline App
//!
//! Composition root for the Faultline runtime.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Log-backed adapters for the interactive collaborator ports
//! - Main entry point and shutdown sequencing
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires the file-backed stores and hooks into the core services

pub mod adapters;
pub mod context;

// Re-export for convenience
pub use adapters::{AppConfigStore, ExitIntent, LogEscalationSurface, ShutdownSignal};
pub use context::AppContext;
