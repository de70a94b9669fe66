//! Retention slots
//!
//! The state a [`Sampler`](crate::Sampler) keeps between harvests. The slots
//! are only ever touched with the sampler's retention lock held.
//!
//! | Slot     | Capacity | Policy |
//! |----------|----------|--------|
//! | slowest  | 1        | longest trace at or over its own threshold |
//! | random   | 1        | most recent trace, emitted every Nth harvest |
//! | forced   | 15       | longest forced traces |
//! | recent   | 100      | ring buffer, diagnostic mode only |

use std::collections::VecDeque;
use std::sync::Arc;
use tracewarden_core::Trace;

/// Maximum forced-persist traces held between harvests
pub const MAX_FORCED_TRACES: usize = 15;

/// Capacity of the diagnostic ring buffer
pub const MAX_RECENT_TRACES: usize = 100;

#[derive(Debug, Default)]
pub(crate) struct RetentionSlots {
    pub(crate) slowest: Option<Arc<Trace>>,
    pub(crate) random: Option<Arc<Trace>>,
    pub(crate) forced: Vec<Arc<Trace>>,
    pub(crate) recent: VecDeque<Arc<Trace>>,
    pub(crate) sampling_rate: u32,
    pub(crate) harvest_count: u32,
}

impl RetentionSlots {
    #[cfg(test)]
    pub(crate) fn with_sampling_rate(sampling_rate: u32) -> Self {
        Self {
            sampling_rate,
            ..Self::default()
        }
    }

    /// Insert into the forced list, keeping the longest `MAX_FORCED_TRACES`
    pub(crate) fn store_forced(&mut self, trace: Arc<Trace>) {
        self.forced.push(trace);
        if self.forced.len() > MAX_FORCED_TRACES {
            self.forced.sort_by(|a, b| b.duration().cmp(&a.duration()));
            let dropped = self.forced.len() - MAX_FORCED_TRACES;
            self.forced.truncate(MAX_FORCED_TRACES);
            tracing::debug!(dropped, "forced trace list over capacity");
        }
    }

    /// Replace the slowest slot if `trace` qualifies and is longer
    pub(crate) fn store_slowest(&mut self, trace: &Arc<Trace>) -> bool {
        if !trace.exceeds_threshold() {
            return false;
        }
        let slower = match &self.slowest {
            Some(current) => trace.duration() > current.duration(),
            None => true,
        };
        if slower {
            self.slowest = Some(Arc::clone(trace));
        }
        slower
    }

    /// Append to the ring buffer, evicting the oldest entries
    pub(crate) fn store_recent(&mut self, trace: &Arc<Trace>) {
        self.recent.push_back(Arc::clone(trace));
        while self.recent.len() > MAX_RECENT_TRACES {
            if let Some(evicted) = self.recent.pop_front() {
                tracing::trace!(trace_id = %evicted.id(), "recent trace evicted");
            }
        }
    }

    /// Most recent trace wins the random slot
    pub(crate) fn store_random(&mut self, trace: Arc<Trace>) {
        self.random = Some(trace);
    }

    /// Advance the harvest counter and report whether the random sample is due
    ///
    /// Only called when the random slot is occupied.
    pub(crate) fn random_sample_due(&mut self) -> bool {
        if self.sampling_rate == 0 {
            return false;
        }
        self.harvest_count = self.harvest_count.wrapping_add(1);
        if self.harvest_count % self.sampling_rate == 0 {
            self.harvest_count = 0;
            true
        } else {
            false
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slowest = None;
        self.random = None;
        self.forced.clear();
        self.recent.clear();
    }
}
