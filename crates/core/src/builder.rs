//! Incremental trace building
//!
//! A [`TraceBuilder`] records one unit of work on the execution context that
//! owns it. Segments live in an arena while the trace is being built; the
//! tree is only assembled once, in [`TraceBuilder::finish`].
//!
//! ## State machine
//!
//! ```text
//! (no builder) --new()--> Building --finish()--> Finalized
//! ```
//!
//! Every mutating call on a `Finalized` builder returns
//! [`TraceError::Finalized`] and leaves the builder untouched.
//!
//! ## Segment limit
//!
//! Once the trace holds `max_segments_per_trace` segments, further pushes are
//! suppressed: they are counted, their pops are absorbed, and any data
//! attached while one is open is dropped.

use crate::config::{RecordSql, SamplerConfig};
use crate::error::{TraceError, TraceResult};
use crate::trace::{append_extra_data, Segment, Trace, ROOT_SEGMENT_NAME};
use crate::types::{Timestamp, TraceId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Lifecycle state of a [`TraceBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Accepting segments and metadata
    Building,
    /// `finish()` was called; the builder is frozen
    Finalized,
}

#[derive(Debug)]
struct Node {
    name: String,
    entry: Timestamp,
    exit: Option<Timestamp>,
    params: BTreeMap<String, serde_json::Value>,
    backtrace: Option<Vec<String>>,
    extra_data: Option<String>,
    children: Vec<usize>,
}

impl Node {
    fn open(name: String, entry: Timestamp) -> Self {
        Self {
            name,
            entry,
            exit: None,
            params: BTreeMap::new(),
            backtrace: None,
            extra_data: None,
            children: Vec::new(),
        }
    }
}

/// Builds one [`Trace`] for one unit of work
#[derive(Debug)]
pub struct TraceBuilder {
    id: TraceId,
    state: BuilderState,
    config: SamplerConfig,
    started_at: DateTime<Utc>,
    start: Timestamp,
    last_time: Timestamp,
    /// Arena; index 0 is the root
    nodes: Vec<Node>,
    /// Open segments, root at the bottom
    stack: Vec<usize>,
    /// Open pushes that hit the segment limit
    suppressed: usize,
    dropped_segments: usize,
    name: Option<String>,
    ignored: bool,
    force_persist: bool,
    params: BTreeMap<String, serde_json::Value>,
    custom_params: BTreeMap<String, serde_json::Value>,
}

impl TraceBuilder {
    /// Start a trace at `time` with an open root segment
    pub fn new(time: Timestamp, config: &SamplerConfig) -> Self {
        Self {
            id: TraceId::new(),
            state: BuilderState::Building,
            config: config.clone(),
            started_at: Utc::now(),
            start: time,
            last_time: time,
            nodes: vec![Node::open(ROOT_SEGMENT_NAME.to_string(), time)],
            stack: vec![0],
            suppressed: 0,
            dropped_segments: 0,
            name: None,
            ignored: false,
            force_persist: false,
            params: BTreeMap::new(),
            custom_params: BTreeMap::new(),
        }
    }

    /// Id the finished trace will carry
    pub fn id(&self) -> TraceId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Monotonic start time
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Current nesting depth, not counting the root
    pub fn scope_depth(&self) -> usize {
        self.stack.len().saturating_sub(1) + self.suppressed
    }

    /// Segments recorded so far, root included
    pub fn segment_count(&self) -> usize {
        self.nodes.len()
    }

    /// Pushes suppressed by the segment limit
    pub fn dropped_segments(&self) -> usize {
        self.dropped_segments
    }

    /// Whether the unit of work was marked as ignored
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Whether the unit of work was marked for forced persistence
    pub fn is_force_persist(&self) -> bool {
        self.force_persist
    }

    /// Open a segment as a child of the current top of stack
    pub fn push(&mut self, name: impl Into<String>, time: Timestamp) -> TraceResult<()> {
        self.ensure_building("push")?;
        self.advance_time(time)?;

        if self.nodes.len() >= self.config.max_segments_per_trace {
            self.suppressed += 1;
            self.dropped_segments += 1;
            tracing::trace!(trace_id = %self.id, "segment limit reached, push suppressed");
            return Ok(());
        }

        let index = self.nodes.len();
        self.nodes.push(Node::open(name.into(), time));
        if let Some(&parent) = self.stack.last() {
            self.nodes[parent].children.push(index);
        }
        self.stack.push(index);
        Ok(())
    }

    /// Close the most recently opened segment
    pub fn pop(&mut self, time: Timestamp) -> TraceResult<()> {
        self.ensure_building("pop")?;
        if self.suppressed > 0 {
            self.advance_time(time)?;
            self.suppressed -= 1;
            return Ok(());
        }
        if self.stack.len() <= 1 {
            return Err(TraceError::NoOpenSegment);
        }
        self.advance_time(time)?;
        if let Some(index) = self.stack.pop() {
            self.nodes[index].exit = Some(time);
        }
        Ok(())
    }

    /// Rename the most recently opened, still open segment
    pub fn rename(&mut self, name: impl Into<String>) -> TraceResult<()> {
        self.ensure_building("rename")?;
        if self.suppressed > 0 {
            return Ok(());
        }
        if self.stack.len() <= 1 {
            return Err(TraceError::NoOpenSegment);
        }
        if let Some(node) = self.current_node() {
            node.name = name.into();
        }
        Ok(())
    }

    /// Attach extra data to the open segment
    ///
    /// Repeated attachments concatenate; the total is capped at
    /// `max_extra_data_len` with a truncation marker.
    pub fn attach_extra_data(&mut self, data: &str) -> TraceResult<()> {
        self.ensure_building("attach_extra_data")?;
        let max_len = self.config.max_extra_data_len;
        if let Some(node) = self.current_node() {
            append_extra_data(&mut node.extra_data, data, max_len);
        }
        Ok(())
    }

    /// Record a SQL statement executed inside the open segment
    ///
    /// Honours `record_sql`; captures a backtrace in diagnostic mode when
    /// the statement took at least `stack_trace_threshold_secs`.
    pub fn notice_sql(&mut self, sql: &str, duration: Duration) -> TraceResult<()> {
        self.ensure_building("notice_sql")?;
        if self.config.record_sql == RecordSql::Off {
            return Ok(());
        }
        self.attach_extra_data(sql)?;
        self.capture_backtrace_if_slow(duration)
    }

    /// Record a cache or NoSQL key used inside the open segment
    pub fn notice_nosql(&mut self, key: &str, duration: Duration) -> TraceResult<()> {
        self.attach_extra_data(key)?;
        self.capture_backtrace_if_slow(duration)
    }

    /// Attach the caller's stack to the open segment
    ///
    /// Only does anything in diagnostic mode.
    pub fn capture_backtrace(&mut self) -> TraceResult<()> {
        self.ensure_building("capture_backtrace")?;
        if !self.config.diagnostic_mode {
            return Ok(());
        }
        let frames: Vec<String> = std::backtrace::Backtrace::force_capture()
            .to_string()
            .lines()
            .map(|line| line.trim().to_string())
            .collect();
        if let Some(node) = self.current_node() {
            node.backtrace = Some(frames);
        }
        Ok(())
    }

    /// Set a parameter on the open segment
    pub fn set_segment_param(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> TraceResult<()> {
        self.ensure_building("set_segment_param")?;
        if let Some(node) = self.current_node() {
            node.params.insert(key.into(), value.into());
        }
        Ok(())
    }

    /// Name the transaction
    pub fn set_transaction_name(&mut self, name: impl Into<String>) -> TraceResult<()> {
        self.ensure_building("set_transaction_name")?;
        self.name = Some(name.into());
        Ok(())
    }

    /// Set an agent-level request parameter
    pub fn set_param(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> TraceResult<()> {
        self.ensure_building("set_param")?;
        self.params.insert(key.into(), value.into());
        Ok(())
    }

    /// Set an application-supplied parameter
    pub fn set_custom_param(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> TraceResult<()> {
        self.ensure_building("set_custom_param")?;
        self.custom_params.insert(key.into(), value.into());
        Ok(())
    }

    /// Mark the unit of work as not worth keeping
    pub fn ignore(&mut self) -> TraceResult<()> {
        self.ensure_building("ignore")?;
        self.ignored = true;
        Ok(())
    }

    /// Exempt the trace from normal retention competition
    pub fn force_persist(&mut self) -> TraceResult<()> {
        self.ensure_building("force_persist")?;
        self.force_persist = true;
        Ok(())
    }

    /// Close every open segment at `time`, freeze the builder and return the trace
    pub fn finish(&mut self, time: Timestamp) -> TraceResult<Trace> {
        self.ensure_building("finish")?;
        self.advance_time(time)?;

        for &index in &self.stack {
            self.nodes[index].exit = Some(time);
        }
        self.stack.clear();
        self.suppressed = 0;
        self.state = BuilderState::Finalized;

        let mut arena: Vec<Option<Node>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(Some)
            .collect();
        let root = assemble(&mut arena, 0, time);

        tracing::trace!(
            trace_id = %self.id,
            segments = root.count(),
            dropped = self.dropped_segments,
            "trace finalized"
        );

        Ok(Trace {
            id: self.id,
            name: self.name.take(),
            started_at: self.started_at,
            start: self.start,
            duration: time.duration_since(self.start),
            threshold: self.config.trace_threshold(),
            ignored: self.ignored,
            force_persist: self.force_persist,
            params: std::mem::take(&mut self.params),
            custom_params: std::mem::take(&mut self.custom_params),
            root,
            truncated_segments: self.dropped_segments,
        })
    }

    fn ensure_building(&self, operation: &'static str) -> TraceResult<()> {
        match self.state {
            BuilderState::Building => Ok(()),
            BuilderState::Finalized => {
                tracing::error!(
                    trace_id = %self.id,
                    operation,
                    "mutation attempted on a finalized trace"
                );
                Err(TraceError::Finalized { trace_id: self.id })
            }
        }
    }

    fn advance_time(&mut self, time: Timestamp) -> TraceResult<()> {
        if time < self.last_time {
            return Err(TraceError::NonMonotonicTime {
                previous: self.last_time,
                given: time,
            });
        }
        self.last_time = time;
        Ok(())
    }

    fn current_node(&mut self) -> Option<&mut Node> {
        if self.suppressed > 0 {
            return None;
        }
        let index = *self.stack.last()?;
        self.nodes.get_mut(index)
    }

    fn capture_backtrace_if_slow(&mut self, duration: Duration) -> TraceResult<()> {
        if self.config.diagnostic_mode && duration >= self.config.stack_trace_threshold() {
            self.capture_backtrace()?;
        }
        Ok(())
    }
}

fn assemble(arena: &mut [Option<Node>], index: usize, finish: Timestamp) -> Segment {
    let node = match arena.get_mut(index).and_then(Option::take) {
        Some(node) => node,
        None => {
            return Segment {
                name: String::new(),
                entry: finish,
                exit: finish,
                params: BTreeMap::new(),
                backtrace: None,
                extra_data: None,
                children: Vec::new(),
            }
        }
    };
    let children = node
        .children
        .iter()
        .map(|&child| assemble(arena, child, finish))
        .collect();
    Segment {
        name: node.name,
        entry: node.entry,
        exit: node.exit.unwrap_or(finish),
        params: node.params,
        backtrace: node.backtrace,
        extra_data: node.extra_data,
        children,
    }
}
