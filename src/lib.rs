//! # Tracewarden
//!
//! Transaction trace sampling and harvest for in-process monitoring agents.
//!
//! Instrumentation hooks report segment boundaries to a [`TraceAgent`]. Each
//! finished unit of work becomes an immutable [`Trace`] that the
//! [`Sampler`] either retains or drops, under fixed memory bounds. A
//! [`PeriodicScheduler`] drains the sampler into a bounded [`HarvestBatch`]
//! once per period and hands it to a [`TraceSink`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use tracewarden::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let agent = TraceAgent::builder().build()?;
//! let sink: Arc<dyn TraceSink> = Arc::new(|batch: &HarvestBatch| {
//!     println!("sending {} traces", batch.len());
//!     Ok::<(), TaskError>(())
//! });
//!
//! let scheduler = Arc::new(agent.scheduler(
//!     SchedulerConfig::new(Duration::from_secs(60)).name("harvest"),
//!     SharedTaskLock::new(),
//! ));
//! let handle = scheduler.spawn(agent.harvest_task(sink))?;
//!
//! agent.on_push("GET /")?;
//! agent.on_pop()?;
//!
//! scheduler.stop();
//! handle.join().expect("scheduler thread panicked")?;
//! # Ok::<(), tracewarden::Error>(())
//! ```
//!
//! ## Retention
//!
//! | Slot    | Keeps |
//! |---------|-------|
//! | slowest | the longest trace over its threshold |
//! | random  | the latest trace, emitted one harvest in N |
//! | forced  | up to 15 traces marked for persistence |
//! | recent  | last 100 traces, diagnostic mode only |

#![warn(missing_docs)]

mod agent;
mod error;

pub mod prelude;

// Re-export main entry points
pub use agent::{TraceAgent, TraceAgentBuilder, TraceSink};
pub use error::{Error, Result};

// Re-export component crates
pub use tracewarden_concurrency::{
    ContextAccessor, ContextId, ExecutionContextRegistry, SharedTaskLock, ThreadContextAccessor,
};
pub use tracewarden_core::{
    BuilderState, Clock, ConfigError, ManualClock, RecordSql, SamplerConfig, Segment, SystemClock,
    Timestamp, Trace, TraceBuilder, TraceError, TraceId,
};
pub use tracewarden_sampler::{
    clamp, obfuscate_sql, HarvestBatch, Sampler, SamplerStats, MAX_FORCED_TRACES,
    MAX_HARVEST_TRACES, MAX_RECENT_TRACES,
};
pub use tracewarden_scheduler::{
    advance_next_invocation, Classify, FailureClass, PeriodicScheduler, SchedulerConfig,
    SchedulerError, SchedulerState, TaskError,
};
