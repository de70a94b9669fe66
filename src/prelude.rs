//! Convenient imports for tracewarden.
//!
//! ```
//! use tracewarden::prelude::*;
//!
//! let agent = TraceAgent::new();
//! assert!(agent.is_enabled());
//! ```

// Main entry point
pub use crate::agent::{TraceAgent, TraceAgentBuilder, TraceSink};

// Error handling
pub use crate::error::{Error, Result};

// Traces
pub use tracewarden_core::{Clock, ManualClock, SamplerConfig, SystemClock, Timestamp, Trace};

// Sampling
pub use tracewarden_sampler::{HarvestBatch, Sampler};

// Scheduling
pub use tracewarden_concurrency::SharedTaskLock;
pub use tracewarden_scheduler::{PeriodicScheduler, SchedulerConfig, TaskError};
