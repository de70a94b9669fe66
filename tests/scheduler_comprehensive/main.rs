//! Scheduler Comprehensive Test Suite
//!
//! Verifies the periodic scheduler's timing, failure handling and the
//! process-wide task lock.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test scheduler_comprehensive
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracewarden::prelude::*;
use tracewarden::{FailureClass, SchedulerError, SchedulerState};

// Test modules
pub mod failures;
pub mod shared_lock;
pub mod timing;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Route log output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Seconds as a timestamp
pub fn at(secs: u64) -> Timestamp {
    Timestamp::ZERO + Duration::from_secs(secs)
}

/// Scheduler on a fresh manual clock starting at zero
pub fn manual_scheduler(config: SchedulerConfig) -> (Arc<ManualClock>, PeriodicScheduler) {
    let clock = Arc::new(ManualClock::new(Timestamp::ZERO));
    let scheduler = PeriodicScheduler::new(
        config,
        SharedTaskLock::new(),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    (clock, scheduler)
}

/// Period in whole seconds
pub fn every(secs: u64) -> SchedulerConfig {
    SchedulerConfig::new(Duration::from_secs(secs))
}
