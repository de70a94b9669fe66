//! Monotonic clocks
//!
//! Everything that reads "now" does it through the [`Clock`] trait so the
//! scheduler and the builders can run against virtual time in tests.

use crate::types::Timestamp;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide origin for [`SystemClock`] timestamps
static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Source of monotonic time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current monotonic time
    fn now(&self) -> Timestamp;

    /// Block the calling thread for roughly `duration`
    ///
    /// Callers must tolerate returning early and re-check [`Clock::now`].
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Wall-time monotonic clock backed by [`Instant`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let micros = u64::try_from(ORIGIN.elapsed().as_micros()).unwrap_or(u64::MAX);
        Timestamp::from_micros(micros)
    }
}

/// Virtual clock for deterministic tests
///
/// `sleep` advances virtual time immediately instead of blocking.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tracewarden_core::{Clock, ManualClock, Timestamp};
///
/// let clock = ManualClock::new(Timestamp::ZERO);
/// clock.sleep(Duration::from_secs(2));
/// assert_eq!(clock.now(), Timestamp::from_secs_f64(2.0));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            micros: AtomicU64::new(start.as_micros()),
        }
    }

    /// Move virtual time forward
    pub fn advance(&self, by: Duration) {
        let micros = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.micros.fetch_add(micros, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Timestamp) {
        self.micros.store(to.as_micros(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.micros.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
