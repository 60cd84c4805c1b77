//! Environment abstraction for deterministic testing.
//!
//! Decouples room and persistence logic from system time. Production code uses
//! a real clock and Tokio sleeps; tests use a manually advanced virtual clock.

use std::time::Duration;

/// Abstract environment providing monotonic time and async sleep.
///
/// # Invariants
///
/// - `now()` never goes backwards within a single execution context.
/// - `sleep()` is the only async method and is awaited by driver code only,
///   never by room logic.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; test environments
    /// use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

pub mod test_utils {
    //! Deterministic environment for tests.

    #![allow(clippy::expect_used, reason = "Poisoned clock mutex aborts the test")]

    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use super::Environment;

    /// Manually advanced virtual clock.
    ///
    /// `now()` reports time since an arbitrary epoch as a [`Duration`].
    /// `sleep()` advances the clock immediately and resolves, so retry/backoff
    /// logic runs in zero wall time under test.
    #[derive(Clone, Default)]
    pub struct ManualEnv {
        clock: Arc<Mutex<Duration>>,
    }

    impl ManualEnv {
        /// Create a clock starting at zero.
        pub fn new() -> Self {
            Self::default()
        }

        /// Advance the clock by `delta`.
        pub fn advance(&self, delta: Duration) {
            let mut clock = self.clock.lock().expect("clock mutex poisoned");
            *clock += delta;
        }
    }

    impl Environment for ManualEnv {
        type Instant = Duration;

        fn now(&self) -> Duration {
            *self.clock.lock().expect("clock mutex poisoned")
        }

        fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            self.advance(duration);
            std::future::ready(())
        }
    }

}
