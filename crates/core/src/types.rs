//! Core identifier and time types
//!
//! This module defines the fundamental types used throughout the system:
//! - [`TraceId`]: Unique identifier for a transaction trace
//! - [`Timestamp`]: Monotonic point in time, microseconds since the clock origin

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a transaction trace
///
/// Every trace gets its own id when its builder is created. The id is used
/// to recognise the same trace when it shows up in more than one retention
/// slot, or when it is carried over from a failed transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Create a new random TraceId using UUID v4
    ///
    /// # Examples
    ///
    /// ```
    /// use tracewarden_core::TraceId;
    ///
    /// let id1 = TraceId::new();
    /// let id2 = TraceId::new();
    /// assert_ne!(id1, id2);
    /// ```
    pub fn new() -> Self {
        TraceId(Uuid::new_v4())
    }

    /// Create TraceId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        TraceId(Uuid::from_bytes(bytes))
    }

    /// Get raw bytes representation
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic timestamp with microsecond resolution
///
/// Timestamps are only meaningful relative to each other and to the
/// [`Clock`](crate::Clock) that produced them.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tracewarden_core::Timestamp;
///
/// let start = Timestamp::from_secs_f64(1.0);
/// let end = start + Duration::from_millis(2500);
/// assert_eq!(end.duration_since(start), Duration::from_millis(2500));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock origin
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from microseconds since the origin
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// Create a timestamp from fractional seconds since the origin
    ///
    /// Negative and non-finite inputs saturate to the origin.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Timestamp((secs * 1_000_000.0) as u64)
        } else {
            Timestamp::ZERO
        }
    }

    /// Microseconds since the origin
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Fractional seconds since the origin
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(micros))
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_sub(micros))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}
