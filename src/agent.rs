//! Instrumentation entry point for tracewarden.
//!
//! [`TraceAgent`] ties the pieces together: instrumentation hooks report
//! boundaries through it, it keeps one [`TraceBuilder`] per execution
//! context, and hands finished traces to its [`Sampler`]. Its harvest task
//! is what a [`PeriodicScheduler`] drives.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracewarden_concurrency::{
    ContextAccessor, ExecutionContextRegistry, SharedTaskLock, ThreadContextAccessor,
};
use tracewarden_core::{Clock, SamplerConfig, SystemClock, Trace, TraceBuilder, TraceResult};
use tracewarden_sampler::{HarvestBatch, Sampler};
use tracewarden_scheduler::{PeriodicScheduler, SchedulerConfig, TaskError};

/// Receives harvested batches; the transport to the collector
pub trait TraceSink: Send + Sync {
    /// Transmit `batch`
    ///
    /// On error the batch is carried into the next harvest.
    fn send(&self, batch: &HarvestBatch) -> std::result::Result<(), TaskError>;
}

impl<F> TraceSink for F
where
    F: Fn(&HarvestBatch) -> std::result::Result<(), TaskError> + Send + Sync,
{
    fn send(&self, batch: &HarvestBatch) -> std::result::Result<(), TaskError> {
        self(batch)
    }
}

/// The in-process tracing agent.
///
/// # Example
///
/// ```
/// use tracewarden::prelude::*;
/// use std::time::Duration;
///
/// let agent = TraceAgent::builder()
///     .config(SamplerConfig::default().trace_threshold_secs(0.0).sampling_rate(0))
///     .build()?;
///
/// agent.on_push("GET /users")?;
/// agent.on_sql("SELECT * FROM users WHERE id = 7", Duration::from_millis(3))?;
/// agent.on_pop()?;
///
/// let batch = agent.harvest();
/// assert_eq!(batch.len(), 1);
/// # Ok::<(), tracewarden::Error>(())
/// ```
pub struct TraceAgent<A: ContextAccessor = ThreadContextAccessor> {
    config: SamplerConfig,
    clock: Arc<dyn Clock>,
    registry: ExecutionContextRegistry<A>,
    sampler: Arc<Sampler>,
    /// Batch whose transmission failed, retried on the next harvest
    pending: Arc<Mutex<Vec<Arc<Trace>>>>,
}

impl TraceAgent<ThreadContextAccessor> {
    /// Agent with default configuration and the system clock.
    pub fn new() -> Self {
        Self::from_parts(
            SamplerConfig::default(),
            Arc::new(SystemClock),
            ThreadContextAccessor,
        )
    }

    /// Create a builder for agent configuration.
    pub fn builder() -> TraceAgentBuilder {
        TraceAgentBuilder::new()
    }
}

impl Default for TraceAgent<ThreadContextAccessor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ContextAccessor> TraceAgent<A> {
    fn from_parts(config: SamplerConfig, clock: Arc<dyn Clock>, accessor: A) -> Self {
        let sampler = Arc::new(Sampler::new(&config));
        Self {
            config,
            clock,
            registry: ExecutionContextRegistry::with_accessor(accessor),
            sampler,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configuration the agent was built with
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// The sampler receiving finished traces
    pub fn sampler(&self) -> &Arc<Sampler> {
        &self.sampler
    }

    /// Clock used to stamp segment boundaries
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Per-context builders
    pub fn registry(&self) -> &ExecutionContextRegistry<A> {
        &self.registry
    }

    /// Whether new units of work are traced
    pub fn is_enabled(&self) -> bool {
        self.sampler.is_enabled()
    }

    /// Turn tracing on or off
    ///
    /// Units of work already in progress still finish; they are dropped by
    /// the sampler while it is off.
    pub fn set_enabled(&self, enabled: bool) {
        self.sampler.set_enabled(enabled);
    }

    /// Open a segment, starting a unit of work if none is active
    pub fn on_push(&self, name: impl Into<String>) -> Result<()> {
        let now = self.clock.now();
        self.registry.start(now, self.is_enabled(), &self.config);
        self.with_current(|builder| builder.push(name, now))
    }

    /// Close the innermost segment
    ///
    /// Closing the outermost segment finishes the unit of work and stores
    /// the trace unless it was ignored.
    pub fn on_pop(&self) -> Result<()> {
        let now = self.clock.now();
        let depth = self
            .registry
            .with_current(|builder| builder.pop(now).map(|()| builder.scope_depth()))
            .transpose()?;
        if depth != Some(0) {
            return Ok(());
        }

        let Some(mut builder) = self.registry.clear() else {
            return Ok(());
        };
        let trace = builder.finish(now)?;
        if trace.is_ignored() {
            tracing::trace!(trace_id = %trace.id(), "ignored trace discarded");
        } else {
            self.sampler.store(trace);
        }
        Ok(())
    }

    /// Record a SQL statement against the open segment
    pub fn on_sql(&self, sql: &str, duration: Duration) -> Result<()> {
        self.with_current(|builder| builder.notice_sql(sql, duration))
    }

    /// Record a cache or NoSQL key against the open segment
    pub fn on_nosql(&self, key: &str, duration: Duration) -> Result<()> {
        self.with_current(|builder| builder.notice_nosql(key, duration))
    }

    /// Rename the innermost open segment
    pub fn rename_current(&self, name: impl Into<String>) -> Result<()> {
        self.with_current(|builder| builder.rename(name))
    }

    /// Name the current unit of work
    pub fn set_transaction_name(&self, name: impl Into<String>) -> Result<()> {
        self.with_current(|builder| builder.set_transaction_name(name))
    }

    /// Discard the current unit of work when it finishes
    pub fn ignore_current(&self) -> Result<()> {
        self.with_current(TraceBuilder::ignore)
    }

    /// Guarantee the current unit of work a place in the next harvest
    pub fn force_persist_current(&self) -> Result<()> {
        self.with_current(TraceBuilder::force_persist)
    }

    /// Nesting depth of the calling context, 0 when idle
    pub fn scope_depth(&self) -> usize {
        self.registry
            .with_current(|builder| builder.scope_depth())
            .unwrap_or(0)
    }

    /// Harvest now, retrying any batch whose transmission failed
    pub fn harvest(&self) -> HarvestBatch {
        let previous = std::mem::take(&mut *self.pending.lock());
        self.sampler.harvest(previous)
    }

    /// Task that harvests and hands the batch to `sink`
    ///
    /// Pass it to [`PeriodicScheduler::run`] or
    /// [`PeriodicScheduler::spawn`]. A failed send keeps the batch for the
    /// next run and returns the sink's error for classification.
    pub fn harvest_task(
        &self,
        sink: Arc<dyn TraceSink>,
    ) -> impl FnMut() -> std::result::Result<(), TaskError> + Send + 'static {
        let sampler = Arc::clone(&self.sampler);
        let pending = Arc::clone(&self.pending);
        move || {
            let previous = std::mem::take(&mut *pending.lock());
            let batch = sampler.harvest(previous);
            if batch.is_empty() {
                return Ok(());
            }
            match sink.send(&batch) {
                Ok(()) => {
                    tracing::debug!(count = batch.len(), "harvest sent");
                    Ok(())
                }
                Err(e) => {
                    tracing::debug!(
                        count = batch.len(),
                        error = %e,
                        "harvest send failed, keeping batch"
                    );
                    pending.lock().extend(batch);
                    Err(e)
                }
            }
        }
    }

    /// Scheduler sharing this agent's clock
    pub fn scheduler(&self, config: SchedulerConfig, lock: SharedTaskLock) -> PeriodicScheduler {
        PeriodicScheduler::new(config, lock, Arc::clone(&self.clock))
    }

    /// Traces waiting to be retried
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    fn with_current(&self, f: impl FnOnce(&mut TraceBuilder) -> TraceResult<()>) -> Result<()> {
        self.registry
            .with_current(f)
            .unwrap_or(Ok(()))
            .map_err(Error::from)
    }
}

impl<A: ContextAccessor> fmt::Debug for TraceAgent<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceAgent")
            .field("config", &self.config)
            .field("active_contexts", &self.registry.len())
            .field("sampler", &self.sampler)
            .finish()
    }
}

/// Builder for [`TraceAgent`].
///
/// # Example
///
/// ```
/// use tracewarden::prelude::*;
/// use std::sync::Arc;
///
/// let agent = TraceAgent::builder()
///     .config(SamplerConfig::default().diagnostic_mode(true))
///     .clock(Arc::new(ManualClock::new(Timestamp::ZERO)))
///     .build()?;
/// assert!(agent.config().diagnostic_mode);
/// # Ok::<(), tracewarden::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct TraceAgentBuilder {
    config: SamplerConfig,
    clock: Arc<dyn Clock>,
}

impl TraceAgentBuilder {
    /// Builder with default configuration and the system clock.
    pub fn new() -> Self {
        Self {
            config: SamplerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `config`.
    pub fn config(mut self, config: SamplerConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from TOML.
    pub fn config_toml(mut self, input: &str) -> Result<Self> {
        self.config = SamplerConfig::from_toml_str(input)?;
        Ok(self)
    }

    /// Use `clock` for boundary timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and build a thread-keyed agent.
    pub fn build(self) -> Result<TraceAgent> {
        self.build_with_accessor(ThreadContextAccessor)
    }

    /// Validate the configuration and build an agent keyed by `accessor`.
    pub fn build_with_accessor<A: ContextAccessor>(self, accessor: A) -> Result<TraceAgent<A>> {
        self.config.validate()?;
        tracing::debug!(
            tracing_enabled = self.config.tracing_enabled,
            diagnostic_mode = self.config.diagnostic_mode,
            sampling_rate = self.config.sampling_rate,
            "trace agent configured"
        );
        Ok(TraceAgent::from_parts(self.config, self.clock, accessor))
    }
}

impl Default for TraceAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
