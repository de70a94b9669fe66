//! The trace sampler
//!
//! [`Sampler`] decides which finished traces survive until the next harvest.
//! All retention state sits behind one mutex, so a harvest either sees a
//! given `store` completely or not at all. Truncation and obfuscation of the
//! outgoing batch happen after the lock is released.

use crate::batch::{clamp, dedup_traces, HarvestBatch, MAX_HARVEST_TRACES};
use crate::obfuscate::obfuscate_sql;
use crate::slots::RetentionSlots;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracewarden_core::{RecordSql, SamplerConfig, Trace};

/// Point-in-time view of the retention slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerStats {
    /// Whether the slowest slot is occupied
    pub slowest: bool,
    /// Whether the random slot is occupied
    pub random: bool,
    /// Entries in the forced list
    pub forced: usize,
    /// Entries in the diagnostic ring buffer
    pub recent: usize,
    /// Current "one in N" cadence
    pub sampling_rate: u32,
    /// Harvests counted toward the next random emission
    pub harvest_count: u32,
}

/// Retention policy and harvest for finished traces
#[derive(Debug)]
pub struct Sampler {
    slots: Mutex<RetentionSlots>,
    enabled: AtomicBool,
    diagnostic_mode: bool,
    max_segments: usize,
    record_sql: RecordSql,
}

impl Sampler {
    /// Create a sampler from `config` with a randomized harvest phase
    pub fn new(config: &SamplerConfig) -> Self {
        let sampler = Self {
            slots: Mutex::new(RetentionSlots::default()),
            enabled: AtomicBool::new(config.tracing_enabled),
            diagnostic_mode: config.diagnostic_mode,
            max_segments: config.max_segments_per_trace,
            record_sql: config.record_sql,
        };
        sampler.set_sampling_rate(config.sampling_rate);
        sampler
    }

    /// Whether store and harvest are active
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn the sampler on or off without touching retained traces
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Current "one in N" random cadence
    pub fn sampling_rate(&self) -> u32 {
        self.slots.lock().sampling_rate
    }

    /// Harvests counted toward the next random emission
    pub fn harvest_count(&self) -> u32 {
        self.slots.lock().harvest_count
    }

    /// Set the random cadence to one in every `rate` harvests
    ///
    /// The harvest counter restarts at a value drawn uniformly from
    /// `[0, rate)`, so separate processes configured with the same rate do
    /// not all emit their random sample on the same cycle. A rate of zero
    /// disables the random slot.
    pub fn set_sampling_rate(&self, rate: u32) {
        let phase = if rate == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..rate)
        };
        let mut slots = self.slots.lock();
        slots.sampling_rate = rate;
        slots.harvest_count = phase;
        if rate == 0 {
            slots.random = None;
        }
        tracing::debug!(rate, phase, "sampling rate changed");
    }

    /// Offer a finished trace to the retention slots
    pub fn store(&self, trace: impl Into<Arc<Trace>>) {
        if !self.is_enabled() {
            return;
        }
        let trace = trace.into();
        if trace.is_ignored() {
            tracing::trace!(trace_id = %trace.id(), "ignored trace not retained");
            return;
        }

        let mut slots = self.slots.lock();
        if trace.is_force_persist() {
            slots.store_forced(Arc::clone(&trace));
        }
        let slowest = slots.store_slowest(&trace);
        if self.diagnostic_mode {
            slots.store_recent(&trace);
        }
        let sampled = slots.sampling_rate > 0;
        if sampled {
            slots.store_random(Arc::clone(&trace));
        }
        drop(slots);

        tracing::trace!(
            trace_id = %trace.id(),
            duration_us = trace.duration().as_micros() as u64,
            forced = trace.is_force_persist(),
            slowest,
            sampled,
            "trace stored"
        );
    }

    /// Drain the retention slots into a batch for transmission
    ///
    /// `previous` holds traces from an earlier batch whose transmission
    /// failed. Forced ones rejoin the forced list; the rest compete with the
    /// slowest slot for the single slow-trace position.
    pub fn harvest(&self, previous: Vec<Arc<Trace>>) -> HarvestBatch {
        if !self.is_enabled() {
            return HarvestBatch::default();
        }

        let mut traces = {
            let mut slots = self.slots.lock();

            let (forced, mut candidates): (Vec<_>, Vec<_>) =
                previous.into_iter().partition(|t| t.is_force_persist());
            for trace in forced {
                slots.store_forced(trace);
            }
            if let Some(slowest) = slots.slowest.take() {
                candidates.push(slowest);
            }
            dedup_traces(&mut candidates);

            let mut traces = Vec::new();
            if let Some(slow) = candidates.into_iter().max_by_key(|t| t.duration()) {
                traces.push(slow);
            }
            if slots.random.is_some() && slots.random_sample_due() {
                traces.extend(slots.random.take());
            }
            traces.append(&mut slots.forced);
            dedup_traces(&mut traces);

            slots.slowest = None;
            slots.random = None;
            traces
        };

        if traces.len() > MAX_HARVEST_TRACES {
            tracing::debug!(
                count = traces.len(),
                limit = MAX_HARVEST_TRACES,
                "harvest over capacity, clamping"
            );
            clamp(&mut traces, MAX_HARVEST_TRACES);
        }
        let traces: Vec<_> = traces.into_iter().map(|t| self.prepare(t)).collect();

        tracing::debug!(count = traces.len(), "harvest complete");
        HarvestBatch::new(traces)
    }

    /// Clear every slot without producing a batch
    pub fn reset(&self) {
        self.slots.lock().clear();
        tracing::debug!("sampler reset");
    }

    /// Snapshot of the diagnostic ring buffer, oldest first
    pub fn recent_traces(&self) -> Vec<Arc<Trace>> {
        self.slots.lock().recent.iter().cloned().collect()
    }

    /// Current slot occupancy
    pub fn stats(&self) -> SamplerStats {
        let slots = self.slots.lock();
        SamplerStats {
            slowest: slots.slowest.is_some(),
            random: slots.random.is_some(),
            forced: slots.forced.len(),
            recent: slots.recent.len(),
            sampling_rate: slots.sampling_rate,
            harvest_count: slots.harvest_count,
        }
    }

    /// Duration of the current slowest-slot occupant
    pub fn slowest_duration(&self) -> Option<Duration> {
        self.slots.lock().slowest.as_ref().map(|t| t.duration())
    }

    fn prepare(&self, trace: Arc<Trace>) -> Arc<Trace> {
        let trace = if trace.segment_count() > self.max_segments {
            Arc::new(trace.truncated(self.max_segments))
        } else {
            trace
        };
        if self.record_sql == RecordSql::Obfuscated && has_extra_data(&trace) {
            Arc::new(trace.map_extra_data(obfuscate_sql))
        } else {
            trace
        }
    }
}

fn has_extra_data(trace: &Trace) -> bool {
    let mut found = false;
    trace.root().walk(&mut |segment| {
        found |= segment.extra_data().is_some();
    });
    found
}
