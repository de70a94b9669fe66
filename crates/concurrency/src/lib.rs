//! Concurrency layer for tracewarden
//!
//! This crate provides the shared-state plumbing around trace collection:
//! - ExecutionContextRegistry: one active TraceBuilder per execution context
//! - ContextAccessor: injectable notion of "who is calling"
//! - SharedTaskLock: the single lock that serializes all periodic tasks

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod registry;
pub mod task_lock;

pub use context::{ContextAccessor, ContextId, ThreadContextAccessor};
pub use registry::ExecutionContextRegistry;
pub use task_lock::SharedTaskLock;
