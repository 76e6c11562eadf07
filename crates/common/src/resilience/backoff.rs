//! Delay schedules between retry attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::serde::duration_millis;

/// How long to wait before the next attempt.
///
/// `attempt` is the 1-based number of the attempt that just failed, so the
/// delay before attempt 2 is `delay_for(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay every time
    Fixed {
        /// Delay between attempts
        #[serde(with = "duration_millis")]
        delay: Duration,
    },
    /// `step * attempt`
    Linear {
        /// Delay multiplied by the attempt number
        #[serde(with = "duration_millis")]
        step: Duration,
    },
    /// `initial * base^(attempt - 1)`, capped at `max_delay`
    Exponential {
        /// Delay after the first failure
        #[serde(with = "duration_millis")]
        initial: Duration,
        /// Growth factor
        base: f64,
        /// Upper bound
        #[serde(with = "duration_millis")]
        max_delay: Duration,
    },
}

impl BackoffStrategy {
    /// Linear schedule, the executor default
    pub const fn linear(step: Duration) -> Self {
        Self::Linear { step }
    }

    /// Delay to wait after `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed { delay } => delay,
            Self::Linear { step } => step.saturating_mul(attempt),
            Self::Exponential { initial, base, max_delay } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let factor = base.max(1.0).powi(exponent);
                #[allow(clippy::cast_precision_loss)]
                let scaled = initial.as_nanos() as f64 * factor;
                #[allow(clippy::cast_precision_loss)]
                let cap = max_delay.as_nanos() as f64;
                if !scaled.is_finite() || scaled >= cap {
                    max_delay
                } else {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    Duration::from_nanos(scaled as u64)
                }
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::linear(Duration::from_millis(1000))
    }
}
