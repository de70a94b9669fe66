//! Failure classification for scheduled tasks

use std::io;

/// How the scheduler reacts to a failed invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Remote endpoint unavailable or slow; logged quietly, schedule continues
    TransientExpected,
    /// Anything else that went wrong; logged with detail, schedule continues
    TransientUnexpected,
    /// Restart, disconnect or process-level signal; stops the scheduler
    FatalControl,
}

impl FailureClass {
    /// Whether this class terminates the scheduler loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureClass::FatalControl)
    }
}

/// Errors that know their own [`FailureClass`]
pub trait Classify {
    /// Category of this error
    fn classify(&self) -> FailureClass;
}

impl Classify for io::Error {
    fn classify(&self) -> FailureClass {
        match self.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::TimedOut
            | io::ErrorKind::BrokenPipe => FailureClass::TransientExpected,
            io::ErrorKind::OutOfMemory => FailureClass::FatalControl,
            _ => FailureClass::TransientUnexpected,
        }
    }
}
