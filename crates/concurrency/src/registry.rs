//! Execution-context registry
//!
//! Maps each execution context to at most one active [`TraceBuilder`].
//!
//! # Design
//!
//! - DashMap keyed by [`ContextId`]: contexts only ever touch their own
//!   entry, so different threads land on different shards and rarely contend
//! - The builder itself needs no lock; the shard guard is held only for the
//!   duration of one call
//!
//! # Deadlock warning
//!
//! [`ExecutionContextRegistry::current`] returns a guard into the map. Do not
//! call back into the registry while holding it; prefer
//! [`ExecutionContextRegistry::with_current`].

use crate::context::{ContextAccessor, ContextId, ThreadContextAccessor};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use tracewarden_core::{SamplerConfig, Timestamp, TraceBuilder};

/// Keyed association from execution context to its active builder
pub struct ExecutionContextRegistry<A: ContextAccessor = ThreadContextAccessor> {
    builders: DashMap<ContextId, TraceBuilder>,
    accessor: A,
}

impl ExecutionContextRegistry<ThreadContextAccessor> {
    /// Registry keyed by OS thread
    pub fn new() -> Self {
        Self::with_accessor(ThreadContextAccessor)
    }
}

impl Default for ExecutionContextRegistry<ThreadContextAccessor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ContextAccessor> ExecutionContextRegistry<A> {
    /// Registry using a caller-supplied notion of context
    pub fn with_accessor(accessor: A) -> Self {
        Self {
            builders: DashMap::new(),
            accessor,
        }
    }

    /// Context of the caller
    pub fn context(&self) -> ContextId {
        self.accessor.current()
    }

    /// Begin a unit of work on the calling context
    ///
    /// Creates a builder only when `enabled` is set and the context has no
    /// active builder yet. `enabled` is the caller's live tracing switch, which
    /// may differ from `config.tracing_enabled` after a runtime change.
    /// Returns `true` if a builder was created.
    pub fn start(&self, time: Timestamp, enabled: bool, config: &SamplerConfig) -> bool {
        if !enabled {
            return false;
        }
        let context = self.context();
        let mut created = false;
        self.builders.entry(context).or_insert_with(|| {
            created = true;
            TraceBuilder::new(time, config)
        });
        if created {
            tracing::trace!(context = %context, "trace builder started");
        }
        created
    }

    /// Active builder of the calling context
    pub fn current(&self) -> Option<RefMut<'_, ContextId, TraceBuilder>> {
        self.builders.get_mut(&self.context())
    }

    /// Run `f` against the calling context's builder, if any
    pub fn with_current<R>(&self, f: impl FnOnce(&mut TraceBuilder) -> R) -> Option<R> {
        self.builders
            .get_mut(&self.context())
            .map(|mut builder| f(&mut builder))
    }

    /// Whether the calling context has an active builder
    pub fn is_active(&self) -> bool {
        self.builders.contains_key(&self.context())
    }

    /// Remove and return the calling context's builder
    pub fn clear(&self) -> Option<TraceBuilder> {
        self.builders
            .remove(&self.context())
            .map(|(_, builder)| builder)
    }

    /// Number of contexts with an active builder
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// Whether no context has an active builder
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}
