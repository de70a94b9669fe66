//! Unified error types for tracewarden.
//!
//! This module wraps the per-crate errors into a single type for callers of
//! the [`TraceAgent`](crate::TraceAgent) facade.

use thiserror::Error;
use tracewarden_core::{ConfigError, TraceError};
use tracewarden_scheduler::{Classify, SchedulerError, TaskError};

/// All tracewarden errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Builder misuse, such as mutating a finished trace
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// Invalid or unparsable configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scheduler could not start or run
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Periodic task failure
    #[error("task failed: {0}")]
    Task(#[from] TaskError),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for tracewarden operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error indicates a defect in the caller.
    ///
    /// Mutating a finished trace is never caused by valid input.
    pub fn is_programming_error(&self) -> bool {
        match self {
            Error::Trace(e) => e.is_programming_error(),
            Error::Internal(_) => true,
            _ => false,
        }
    }

    /// Check if this error should stop the agent's periodic work.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Task(e) if e.classify().is_fatal())
    }
}

// A fatal scheduler stop surfaces the task error that caused it
impl From<SchedulerError<TaskError>> for Error {
    fn from(e: SchedulerError<TaskError>) -> Self {
        match e {
            SchedulerError::Fatal(task) => Error::Task(task),
            other => Error::Scheduler(other.to_string()),
        }
    }
}
