//! Core types for tracewarden
//!
//! This crate defines the data model shared by every other crate:
//! - [`Trace`] and [`Segment`]: immutable timing tree of one unit of work
//! - [`TraceBuilder`]: the only way to produce a `Trace`
//! - [`SamplerConfig`]: the knobs that bound memory and sampling
//! - [`Clock`]: monotonic time source, real or virtual

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod trace;
pub mod types;

pub use builder::{BuilderState, TraceBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RecordSql, SamplerConfig, DEFAULT_MAX_EXTRA_DATA_LEN};
pub use error::{ConfigError, TraceError, TraceResult};
pub use trace::{Segment, Trace, ROOT_SEGMENT_NAME};
pub use types::{Timestamp, TraceId};
