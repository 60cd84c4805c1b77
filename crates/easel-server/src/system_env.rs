//! Production environment implementation using system time.
//!
//! `SystemEnv` backs the [`Environment`] abstraction with the real monotonic
//! clock and Tokio sleeps. Test code uses the core crate's `ManualEnv` (or
//! Tokio's paused clock) instead.

use std::time::Duration;

use easel_core::env::Environment;

/// Production environment: real monotonic clock, Tokio async sleep.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
