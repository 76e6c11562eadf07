//! Recovery orchestration: strategy registry, loop breaker and built-ins

pub mod ports;
pub mod service;
pub mod strategies;

pub use ports::{RecoveryStateStore, RecoveryStrategy};
pub use service::{RecoveryOrchestrator, RecoverySettings};
pub use strategies::{builtin_strategies, Collaborators};
