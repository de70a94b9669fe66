//! Error types for trace building and configuration

use crate::types::{Timestamp, TraceId};
use thiserror::Error;

/// Errors raised while building a trace
///
/// Every variant is a programming error: a well-behaved instrumentation
/// layer that follows the builder state machine never sees one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// A mutation was attempted after `finish()`
    #[error("trace {trace_id} is already finalized")]
    Finalized {
        /// The finalized trace
        trace_id: TraceId,
    },

    /// `pop()` called with only the root segment open
    #[error("no open segment to close")]
    NoOpenSegment,

    /// A timestamp earlier than one already recorded
    #[error("timestamp {given} precedes previously recorded {previous}")]
    NonMonotonicTime {
        /// Latest timestamp already recorded on the trace
        previous: Timestamp,
        /// Offending timestamp
        given: Timestamp,
    },
}

impl TraceError {
    /// Check if this error indicates a defect in the calling code.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            TraceError::Finalized { .. }
                | TraceError::NoOpenSegment
                | TraceError::NonMonotonicTime { .. }
        )
    }
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// TOML could not be parsed
    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for trace building
pub type TraceResult<T> = std::result::Result<T, TraceError>;
