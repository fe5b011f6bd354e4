use std::thread;
use std::time::{Duration, Instant};

/// Time source for settle polling.
///
/// `sleep` blocks the caller on real clocks; test clocks only advance `now`.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time since `epoch`, zero if `epoch` lies in the future.
    fn since(&self, epoch: Instant) -> Duration {
        self.now().saturating_duration_since(epoch)
    }
}

/// Wall-clock monotonic time backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic clock: sleep(d) advances time by d without blocking.
    ///
    /// Also counts sleeps so tests can assert how many polls happened.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
        sleeps: Arc<Mutex<u32>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
                sleeps: Arc::new(Mutex::new(0)),
            }
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Time elapsed since construction.
        pub fn elapsed(&self) -> Duration {
            self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }

        /// Number of sleep() calls observed so far.
        pub fn sleep_count(&self) -> u32 {
            self.sleeps.lock().map(|g| *g).unwrap_or(0)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            if let Ok(mut n) = self.sleeps.lock() {
                *n = n.saturating_add(1);
            }
            self.advance(d);
        }
    }
}
