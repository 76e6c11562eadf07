//! Adapters for the collaborator ports the binary has to provide itself

pub mod config_store;
pub mod escalation;
pub mod process;

pub use config_store::AppConfigStore;
pub use escalation::LogEscalationSurface;
pub use process::{ExitIntent, ShutdownSignal};
