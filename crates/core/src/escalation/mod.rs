//! Escalation of unrecovered critical faults

pub mod service;

pub use service::EscalationHandler;
