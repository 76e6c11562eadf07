//! Time abstraction shared by the breaker, the recovery loop guard and the
//! fault recorder.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of monotonic and wall-clock time.
///
/// Production code uses [`SystemClock`]; tests drive [`MockClock`] forward
/// explicitly so window and timeout logic runs without real sleeps.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Current wall-clock time
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        let millis = self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same elapsed counter, so a clock handed to a service can
/// still be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    epoch: SystemTime,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Mock clock whose wall time starts at the UNIX epoch
    pub fn new() -> Self {
        Self::starting_at(UNIX_EPOCH)
    }

    /// Mock clock whose wall time starts at `epoch`
    pub fn starting_at(epoch: SystemTime) -> Self {
        Self { start: Instant::now(), epoch, elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Move time forward by whole milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Jump to an absolute offset from the start
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Time advanced so far
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates that `MockClock` moves both time bases together.
    ///
    /// Assertions:
    /// - Monotonic time advances by exactly the requested amount.
    /// - Wall time advances from the configured epoch.
    #[test]
    fn test_mock_clock_advances_both_time_bases() {
        let epoch = UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = MockClock::starting_at(epoch);
        let before = clock.now();

        clock.advance(Duration::from_secs(5));
        clock.advance_millis(250);

        assert_eq!(clock.now().duration_since(before), Duration::from_millis(5_250));
        assert_eq!(clock.system_time(), epoch + Duration::from_millis(5_250));
        assert_eq!(clock.millis_since_epoch(), 1_005_250);
    }

    /// Validates that clones share the elapsed counter.
    ///
    /// Assertions:
    /// - Advancing the original is visible through the clone.
    #[test]
    fn test_mock_clock_clones_share_time() {
        let clock = MockClock::new();
        let shared = clock.clone();

        clock.set_elapsed(Duration::from_secs(42));

        assert_eq!(shared.elapsed(), Duration::from_secs(42));
    }

    #[test]
    fn test_arc_dyn_clock_delegates() {
        let mock = MockClock::new();
        let clock: Arc<dyn Clock> = Arc::new(mock.clone());
        mock.advance_millis(10);
        assert_eq!(clock.millis_since_epoch(), 10);
    }
}
