//! Error types for the scheduler
//!
//! [`TaskError`] is what the agent's own periodic work returns.
//! [`SchedulerError`] is what `run` hands back to its caller.

use crate::classify::{Classify, FailureClass};
use std::io;
use thiserror::Error;

/// Failure of one periodic task invocation
#[derive(Debug, Error)]
pub enum TaskError {
    /// Could not reach the collector
    #[error("server connection failed: {0}")]
    ServerConnection(String),

    /// The collector did not answer in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Collector asked the agent to restart
    #[error("forced restart: {0}")]
    ForceRestart(String),

    /// Collector asked the agent to disconnect
    #[error("forced disconnect: {0}")]
    ForceDisconnect(String),

    /// The process is shutting down
    #[error("shutdown requested")]
    Shutdown,

    /// Allocation failure
    #[error("out of memory")]
    OutOfMemory,

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl Classify for TaskError {
    fn classify(&self) -> FailureClass {
        match self {
            TaskError::ServerConnection(_) | TaskError::Timeout(_) => {
                FailureClass::TransientExpected
            }
            TaskError::ForceRestart(_)
            | TaskError::ForceDisconnect(_)
            | TaskError::Shutdown
            | TaskError::OutOfMemory => FailureClass::FatalControl,
            TaskError::Other(_) => FailureClass::TransientUnexpected,
        }
    }
}

impl From<io::Error> for TaskError {
    fn from(e: io::Error) -> Self {
        match e.classify() {
            FailureClass::TransientExpected if e.kind() == io::ErrorKind::TimedOut => {
                TaskError::Timeout(e.to_string())
            }
            FailureClass::TransientExpected => TaskError::ServerConnection(e.to_string()),
            FailureClass::FatalControl => TaskError::OutOfMemory,
            FailureClass::TransientUnexpected => TaskError::Other(e.to_string()),
        }
    }
}

/// Why a scheduler loop could not start or stopped abnormally
#[derive(Debug, Error)]
pub enum SchedulerError<E> {
    /// The configured period is zero
    #[error("scheduler period must be greater than zero")]
    InvalidPeriod,

    /// `run` was called on a scheduler that is already looping
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// A task returned a fatal control error
    #[error("fatal task error: {0}")]
    Fatal(E),

    /// The scheduler thread could not be created
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[source] io::Error),
}

impl<E> SchedulerError<E> {
    /// The fatal task error, if that is what stopped the loop
    pub fn into_fatal(self) -> Option<E> {
        match self {
            SchedulerError::Fatal(e) => Some(e),
            _ => None,
        }
    }
}
