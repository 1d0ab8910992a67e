//! Time source used by the politeness gate and the connection pool.
//!
//! Production code runs on [`SystemClock`]; [`ManualClock`] replaces real
//! waiting with virtual time so spacing and idle/lifetime rules can be
//! checked deterministically.

use crate::cancel::{CancelToken, Interrupted};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + fmt::Debug {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Suspends the caller for `duration`, failing with [`Interrupted`] if
    /// `cancel` fires first.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Interrupted>;
}

/// Real monotonic time; sleeping is a cancellable condvar wait.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Interrupted> {
        if cancel.wait_timeout(duration) {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Virtual time that only moves when advanced or slept on.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset = offset.saturating_add(by);
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Interrupted> {
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        self.advance(duration);
        Ok(())
    }
}
