//! Finalized transaction traces
//!
//! A [`Trace`] is the immutable result of [`TraceBuilder::finish`]. It owns a
//! tree of [`Segment`]s rooted at a synthetic `ROOT` segment. Nothing in this
//! module mutates a trace in place: truncation and extra-data rewriting return
//! new values.
//!
//! [`TraceBuilder::finish`]: crate::TraceBuilder::finish

use crate::types::{Timestamp, TraceId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Name of the synthetic root segment
pub const ROOT_SEGMENT_NAME: &str = "ROOT";

/// Separator placed between extra-data additions on the same segment
pub const EXTRA_DATA_SEPARATOR: &str = ";\n";

/// Marker appended to extra data that hit its length cap
pub const TRUNCATION_MARKER: &str = "...";

/// One traced sub-operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub(crate) name: String,
    pub(crate) entry: Timestamp,
    pub(crate) exit: Timestamp,
    pub(crate) params: BTreeMap<String, serde_json::Value>,
    pub(crate) backtrace: Option<Vec<String>>,
    pub(crate) extra_data: Option<String>,
    pub(crate) children: Vec<Segment>,
}

impl Segment {
    /// Metric-style name of the operation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry time
    pub fn entry(&self) -> Timestamp {
        self.entry
    }

    /// Exit time
    pub fn exit(&self) -> Timestamp {
        self.exit
    }

    /// Time spent between entry and exit, children included
    pub fn duration(&self) -> Duration {
        self.exit.duration_since(self.entry)
    }

    /// Free-form parameters
    pub fn params(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.params
    }

    /// Caller stack captured in diagnostic mode
    pub fn backtrace(&self) -> Option<&[String]> {
        self.backtrace.as_deref()
    }

    /// SQL text, cache key or other attached data
    pub fn extra_data(&self) -> Option<&str> {
        self.extra_data.as_deref()
    }

    /// Nested segments in call order
    pub fn children(&self) -> &[Segment] {
        &self.children
    }

    /// Number of segments in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Segment::count).sum::<usize>()
    }

    /// Visit this subtree in pre-order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Segment)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    fn without_children(&self) -> Segment {
        Segment {
            name: self.name.clone(),
            entry: self.entry,
            exit: self.exit,
            params: self.params.clone(),
            backtrace: self.backtrace.clone(),
            extra_data: self.extra_data.clone(),
            children: Vec::new(),
        }
    }

    /// Keep the first `remaining` segments of a pre-order walk
    fn truncated(&self, remaining: &mut usize) -> Segment {
        *remaining = remaining.saturating_sub(1);
        let mut kept = self.without_children();
        for child in &self.children {
            if *remaining == 0 {
                break;
            }
            kept.children.push(child.truncated(remaining));
        }
        kept
    }

    fn map_extra_data(&self, f: &impl Fn(&str) -> String) -> Segment {
        let mut mapped = self.without_children();
        mapped.extra_data = self.extra_data.as_deref().map(f);
        mapped.children = self
            .children
            .iter()
            .map(|child| child.map_extra_data(f))
            .collect();
        mapped
    }
}

/// Append `data` to a segment's extra data, enforcing `max_len`
///
/// Additions concatenate with [`EXTRA_DATA_SEPARATOR`]. When the result is
/// longer than `max_len` bytes it is cut at the nearest char boundary and
/// [`TRUNCATION_MARKER`] is appended.
pub fn append_extra_data(existing: &mut Option<String>, data: &str, max_len: usize) {
    let mut combined = match existing.take() {
        Some(mut previous) => {
            previous.push_str(EXTRA_DATA_SEPARATOR);
            previous.push_str(data);
            previous
        }
        None => data.to_string(),
    };
    if combined.len() > max_len {
        let mut end = max_len;
        while !combined.is_char_boundary(end) {
            end -= 1;
        }
        combined.truncate(end);
        combined.push_str(TRUNCATION_MARKER);
    }
    *existing = Some(combined);
}

/// Immutable timing tree for one completed unit of work
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub(crate) id: TraceId,
    pub(crate) name: Option<String>,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) start: Timestamp,
    pub(crate) duration: Duration,
    pub(crate) threshold: Duration,
    pub(crate) ignored: bool,
    pub(crate) force_persist: bool,
    pub(crate) params: BTreeMap<String, serde_json::Value>,
    pub(crate) custom_params: BTreeMap<String, serde_json::Value>,
    pub(crate) root: Segment,
    pub(crate) truncated_segments: usize,
}

impl Trace {
    /// Unique id
    pub fn id(&self) -> TraceId {
        self.id
    }

    /// Transaction name, if one was assigned
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Wall-clock time at which the unit of work began
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Monotonic start time
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Overall duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Slow-trace threshold captured when the trace started
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// True when the duration meets or exceeds the threshold
    pub fn exceeds_threshold(&self) -> bool {
        self.duration >= self.threshold
    }

    /// Whether the unit of work asked not to be traced
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Whether the trace bypasses the normal retention competition
    pub fn is_force_persist(&self) -> bool {
        self.force_persist
    }

    /// Agent-supplied request parameters
    pub fn params(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.params
    }

    /// Application-supplied parameters
    pub fn custom_params(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.custom_params
    }

    /// Root of the segment tree
    pub fn root(&self) -> &Segment {
        &self.root
    }

    /// Total number of segments, root included
    pub fn segment_count(&self) -> usize {
        self.root.count()
    }

    /// Segments dropped by truncation so far
    pub fn truncated_segments(&self) -> usize {
        self.truncated_segments
    }

    /// Copy of this trace holding at most `max_segments` segments
    ///
    /// Segments are kept in pre-order, so the root and the earliest calls
    /// survive. The root is always kept.
    pub fn truncated(&self, max_segments: usize) -> Trace {
        let count = self.segment_count();
        let limit = max_segments.max(1);
        if count <= limit {
            return self.clone();
        }
        let mut remaining = limit;
        let root = self.root.truncated(&mut remaining);
        Trace {
            root,
            truncated_segments: self.truncated_segments + (count - limit),
            ..self.clone_header()
        }
    }

    /// Copy of this trace with every segment's extra data rewritten by `f`
    pub fn map_extra_data(&self, f: impl Fn(&str) -> String) -> Trace {
        Trace {
            root: self.root.map_extra_data(&f),
            ..self.clone_header()
        }
    }

    fn clone_header(&self) -> Trace {
        Trace {
            id: self.id,
            name: self.name.clone(),
            started_at: self.started_at,
            start: self.start,
            duration: self.duration,
            threshold: self.threshold,
            ignored: self.ignored,
            force_persist: self.force_persist,
            params: self.params.clone(),
            custom_params: self.custom_params.clone(),
            root: self.root.without_children(),
            truncated_segments: self.truncated_segments,
        }
    }
}
