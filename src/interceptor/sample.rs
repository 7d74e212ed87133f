//! In-flight measurement handles.

use std::sync::Arc;
use std::time::Instant;

use crate::sink::{LongTaskHandle, Tag, TimerSink};

use super::context::CallContext;
use super::descriptor::InvocationDescriptor;
use super::outcome::OUTCOME_NONE;

/// A measurement in progress. Finalized exactly once, on whichever exit path
/// the invocation takes.
pub(crate) enum Sample {
    Point(PointSample),
    LongTask(LongTaskSample),
}

impl Sample {
    pub fn complete(self, outcome: &'static str) {
        match self {
            Sample::Point(sample) => sample.complete(outcome),
            Sample::LongTask(sample) => sample.stop(),
        }
    }

    /// Strip the publish-on-drop guarantee. A deferred sample that is
    /// dropped before its invocation terminates stays silent: the
    /// measurement is lost, not guessed.
    pub fn deferred(self) -> Self {
        match self {
            Sample::Point(sample) => Sample::Point(sample.deferred()),
            Sample::LongTask(sample) => Sample::LongTask(sample.deferred()),
        }
    }
}

/// Point-in-time measurement: one start/stop duration, visible only on
/// completion. Unless deferred, it publishes from `Drop`, so a synchronous
/// call that unwinds still records (with the sentinel outcome, since no
/// error value ever surfaced).
pub(crate) struct PointSample {
    sink: Arc<dyn TimerSink>,
    descriptor: InvocationDescriptor,
    context: CallContext,
    context_tags: Vec<Tag>,
    started: Instant,
    outcome: &'static str,
    armed: bool,
}

impl PointSample {
    pub fn start(
        sink: Arc<dyn TimerSink>,
        descriptor: InvocationDescriptor,
        context: CallContext,
        context_tags: Vec<Tag>,
    ) -> Self {
        Self {
            sink,
            descriptor,
            context,
            context_tags,
            started: Instant::now(),
            outcome: OUTCOME_NONE,
            armed: true,
        }
    }

    pub fn deferred(mut self) -> Self {
        self.armed = false;
        self
    }

    /// Publish with the given outcome. Consumes the sample; the drop guard
    /// is disarmed so nothing publishes twice.
    pub fn complete(mut self, outcome: &'static str) {
        self.outcome = outcome;
        self.armed = false;
        self.publish();
    }

    fn publish(&self) {
        let elapsed = self.started.elapsed();
        let spec = self
            .descriptor
            .resolve(&self.context, &self.context_tags, Some(self.outcome));
        // Publication failures never reach the caller.
        let _ = self.sink.record(&spec, elapsed);
    }
}

impl Drop for PointSample {
    fn drop(&mut self) {
        if self.armed {
            self.publish();
        }
    }
}

/// Long-task measurement wrapping the sink's stop-once handle.
pub(crate) struct LongTaskSample {
    handle: Option<Box<dyn LongTaskHandle>>,
    armed: bool,
}

impl LongTaskSample {
    pub fn new(handle: Box<dyn LongTaskHandle>) -> Self {
        Self {
            handle: Some(handle),
            armed: true,
        }
    }

    pub fn deferred(mut self) -> Self {
        self.armed = false;
        self
    }

    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

impl Drop for LongTaskSample {
    fn drop(&mut self) {
        if self.armed {
            if let Some(handle) = self.handle.take() {
                handle.stop();
            }
        }
    }
}
