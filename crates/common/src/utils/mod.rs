//! Common utility functions
//!
//! - **[`serde`]**: Serialization helpers for durations in configs and
//!   reports
//! - **[`panic`]**: Panic payload formatting, and marking regions whose
//!   panics are already handled

pub mod panic;
pub mod serde;

pub use self::panic::{contain_panics, panic_is_contained, panic_message, Contained};
pub use self::serde::duration_millis;
