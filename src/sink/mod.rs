//! Metrics sink abstraction.
//!
//! The interception layer publishes through a [`TimerSink`] handle passed in
//! explicitly at construction time; there is no process-wide default sink.
//! Publication is best-effort: callers discard every [`SinkError`] and never
//! retry, so an implementation may reject anything without affecting the
//! instrumented call.

use std::borrow::Cow;
use std::time::Duration;

use thiserror::Error;

pub mod memory;
pub mod recorder;

pub use memory::MemorySink;
pub use recorder::RecorderSink;

/// Key/value label attached to a published measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    key: Cow<'static, str>,
    value: Cow<'static, str>,
}

impl Tag {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Fully-resolved identity of a timer at publication time.
#[derive(Debug, Clone)]
pub struct TimerSpec {
    pub name: Cow<'static, str>,
    pub description: Option<Cow<'static, str>>,
    pub tags: Vec<Tag>,
    /// Whether the metric should publish a latency histogram.
    pub histogram: bool,
}

/// Why a sink rejected an operation.
#[derive(Debug, Error)]
#[error("metrics sink rejected '{name}': {reason}")]
pub struct SinkError {
    name: String,
    reason: String,
}

impl SinkError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A long-task measurement in progress: its duration is observable while the
/// operation still runs. Stopped exactly once; a handle dropped without
/// `stop` leaves the sample unfinished.
pub trait LongTaskHandle: Send {
    fn stop(self: Box<Self>);
}

/// Where finished measurements go.
///
/// Implementations must be callable from any thread and own their
/// synchronization. Errors are advisory only — the interception layer
/// swallows them all.
pub trait TimerSink: Send + Sync {
    /// Publish one finished duration.
    fn record(&self, spec: &TimerSpec, duration: Duration) -> Result<(), SinkError>;

    /// Register and start a long-task sample. Many samples for the same
    /// metric name may be active at once.
    fn start_long_task(&self, spec: &TimerSpec) -> Result<Box<dyn LongTaskHandle>, SinkError>;

    /// Increment a counter.
    fn increment(&self, name: &str, tags: &[Tag], by: u64) -> Result<(), SinkError>;
}
