//! Execution context identification
//!
//! An execution context is one thread of control that runs application work.
//! The registry never asks the runtime "who am I" directly; it goes through a
//! [`ContextAccessor`], so embedders running on green threads or worker pools
//! can supply their own notion of identity.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier of an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Wrap a raw identifier
    pub const fn new(raw: u64) -> Self {
        ContextId(raw)
    }

    /// Raw identifier
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Resolves the calling execution context
pub trait ContextAccessor: Send + Sync {
    /// Identifier of the context making this call
    fn current(&self) -> ContextId;
}

impl<F> ContextAccessor for F
where
    F: Fn() -> ContextId + Send + Sync,
{
    fn current(&self) -> ContextId {
        self()
    }
}

static NEXT_THREAD_CONTEXT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_CONTEXT: ContextId =
        ContextId(NEXT_THREAD_CONTEXT.fetch_add(1, Ordering::Relaxed));
}

/// One context per OS thread
///
/// Ids are handed out lazily the first time a thread asks and are never
/// reused within the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadContextAccessor;

impl ContextAccessor for ThreadContextAccessor {
    fn current(&self) -> ContextId {
        THREAD_CONTEXT.with(|id| *id)
    }
}
