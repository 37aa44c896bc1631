//! Time source abstraction
//!
//! Every wait in the client is a deadline compared against [`Clock::now`].
//! Only the blocking convenience wrappers ever call [`Clock::sleep`], and
//! only between polls.

use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock {
    /// Current instant
    fn now(&self) -> Instant;

    /// Block the caller for `duration`
    fn sleep(&self, duration: Duration);

    /// Time elapsed since `earlier`, saturating at zero
    fn since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Wall-clock time from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockClock;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use super::Clock;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    /// Manually driven clock; clones share the same time
    #[derive(Debug, Clone)]
    pub struct MockClock {
        origin: Instant,
        offset: Rc<Cell<Duration>>,
    }

    impl MockClock {
        /// Clock frozen at the moment of creation
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Rc::new(Cell::new(Duration::ZERO)),
            }
        }

        /// Move time forward
        pub fn advance(&self, by: Duration) {
            self.offset.set(self.offset.get() + by);
        }

        /// Total time advanced since creation
        pub fn elapsed(&self) -> Duration {
            self.offset.get()
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            self.origin + self.offset.get()
        }

        fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_is_shared() {
        let clock = MockClock::new();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::from_secs(2));
        clock.sleep(Duration::from_millis(500));

        assert_eq!(clock.since(start), Duration::from_millis(2500));
        assert_eq!(handle.elapsed(), Duration::from_millis(2500));
    }

    #[test]
    fn test_since_saturates() {
        let clock = MockClock::new();
        let later = clock.now() + Duration::from_secs(1);
        assert_eq!(clock.since(later), Duration::ZERO);
    }
}
