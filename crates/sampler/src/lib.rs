//! Trace retention for tracewarden
//!
//! - [`Sampler`]: decides which finished traces are kept and drains them at harvest
//! - [`HarvestBatch`]: the bounded output of one harvest
//! - [`obfuscate_sql`]: literal scrubbing applied to outgoing SQL

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod obfuscate;
pub mod sampler;
mod slots;

pub use batch::{clamp, dedup_traces, HarvestBatch, MAX_HARVEST_TRACES};
pub use obfuscate::obfuscate_sql;
pub use sampler::{Sampler, SamplerStats};
pub use slots::{MAX_FORCED_TRACES, MAX_RECENT_TRACES};
