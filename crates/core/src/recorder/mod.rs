//! Fault recorder: capture, bounded history, queries and subscribers

pub mod ports;
pub mod service;
mod subscribers;

pub use ports::{FaultStore, SystemProbe};
pub use service::FaultRecorder;
pub use subscribers::SubscriptionId;
