//! # Faultline Domain
//!
//! Fault and recovery data types for Faultline.
//!
//! This crate contains:
//! - Fault records, severities, sources and system snapshots
//! - Recovery state, outcomes and escalation choices
//! - Query and report types for the fault history
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Faultline crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
