//! Periodic task scheduling for tracewarden
//!
//! - [`PeriodicScheduler`]: fixed-period loop with skip-on-overrun timing
//! - [`FailureClass`] / [`Classify`]: how a failed invocation is handled
//! - [`TaskError`]: the agent's error type for periodic work

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod config;
pub mod error;
pub mod scheduler;

pub use classify::{Classify, FailureClass};
pub use config::{SchedulerConfig, DEFAULT_THREAD_NAME};
pub use error::{SchedulerError, TaskError};
pub use scheduler::{advance_next_invocation, PeriodicScheduler, SchedulerState, WAIT_SLICE};
