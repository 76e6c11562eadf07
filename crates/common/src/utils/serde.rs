//! Serialization utilities for common data types

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a `Duration` as whole milliseconds (u64)
///
/// Drain reports, breaker configs and executor timings are persisted and
/// logged as JSON; milliseconds keep them readable and language-neutral.
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use faultline_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     deadline: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize a Duration as milliseconds
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Deserialize milliseconds into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
