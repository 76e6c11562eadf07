//! File-backed implementations of the storage ports

pub mod fault_store;
pub mod state_store;

pub use fault_store::FileFaultStore;
pub use state_store::FileRecoveryStateStore;
