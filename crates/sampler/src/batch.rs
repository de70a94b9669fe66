//! Harvest output
//!
//! A [`HarvestBatch`] is what one harvest hands to the transport. Helpers in
//! this module enforce its size cap and uniqueness.

use std::collections::HashSet;
use std::sync::Arc;
use tracewarden_core::{Trace, TraceId};

/// Maximum traces a single harvest may emit
pub const MAX_HARVEST_TRACES: usize = 20;

/// Traces produced by one harvest, ready for transmission
#[derive(Debug, Clone, Default)]
pub struct HarvestBatch {
    traces: Vec<Arc<Trace>>,
}

impl HarvestBatch {
    /// Wrap a list of traces
    pub fn new(traces: Vec<Arc<Trace>>) -> Self {
        Self { traces }
    }

    /// Number of traces
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether the harvest produced nothing
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Iterate over the traces
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Trace>> {
        self.traces.iter()
    }

    /// Whether a trace with `id` is in the batch
    pub fn contains(&self, id: TraceId) -> bool {
        self.traces.iter().any(|t| t.id() == id)
    }

    /// Borrow the traces
    pub fn traces(&self) -> &[Arc<Trace>] {
        &self.traces
    }

    /// Take ownership of the traces
    pub fn into_traces(self) -> Vec<Arc<Trace>> {
        self.traces
    }
}

impl IntoIterator for HarvestBatch {
    type Item = Arc<Trace>;
    type IntoIter = std::vec::IntoIter<Arc<Trace>>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.into_iter()
    }
}

impl<'a> IntoIterator for &'a HarvestBatch {
    type Item = &'a Arc<Trace>;
    type IntoIter = std::slice::Iter<'a, Arc<Trace>>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}

/// Drop later occurrences of the same trace, keeping order
pub fn dedup_traces(traces: &mut Vec<Arc<Trace>>) {
    let mut seen = HashSet::with_capacity(traces.len());
    traces.retain(|t| seen.insert(t.id()));
}

/// Order forced traces first, then by duration descending, and keep `limit`
pub fn clamp(traces: &mut Vec<Arc<Trace>>, limit: usize) {
    traces.sort_by(|a, b| {
        b.is_force_persist()
            .cmp(&a.is_force_persist())
            .then_with(|| b.duration().cmp(&a.duration()))
    });
    traces.truncate(limit);
}
