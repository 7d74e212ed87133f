//! Production sink over the `metrics` facade.

use std::time::{Duration, Instant};

use metrics::Label;

use super::{LongTaskHandle, SinkError, Tag, TimerSink, TimerSpec};

/// Forwards measurements to whatever recorder the `metrics` facade has
/// installed — in this service, the Prometheus exporter set up by
/// `crate::metrics::install`.
///
/// Timers become histograms in seconds. A long-task sample increments a
/// `<name>_active` gauge while running and records the final duration to
/// `<name>_duration_seconds` when stopped.
#[derive(Debug, Default, Clone)]
pub struct RecorderSink;

impl RecorderSink {
    pub fn new() -> Self {
        Self
    }
}

fn labels(tags: &[Tag]) -> Vec<Label> {
    tags.iter()
        .map(|tag| Label::new(tag.key().to_string(), tag.value().to_string()))
        .collect()
}

impl TimerSink for RecorderSink {
    fn record(&self, spec: &TimerSpec, duration: Duration) -> Result<(), SinkError> {
        if let Some(description) = &spec.description {
            ::metrics::describe_histogram!(spec.name.to_string(), description.to_string());
        }
        ::metrics::histogram!(spec.name.to_string(), labels(&spec.tags))
            .record(duration.as_secs_f64());
        Ok(())
    }

    fn start_long_task(&self, spec: &TimerSpec) -> Result<Box<dyn LongTaskHandle>, SinkError> {
        let name = spec.name.to_string();
        let labels = labels(&spec.tags);
        ::metrics::gauge!(format!("{name}_active"), labels.clone()).increment(1.0);
        Ok(Box::new(RecorderLongTask {
            name,
            labels,
            started: Instant::now(),
        }))
    }

    fn increment(&self, name: &str, tags: &[Tag], by: u64) -> Result<(), SinkError> {
        ::metrics::counter!(name.to_string(), labels(tags)).increment(by);
        Ok(())
    }
}

struct RecorderLongTask {
    name: String,
    labels: Vec<Label>,
    started: Instant,
}

impl LongTaskHandle for RecorderLongTask {
    fn stop(self: Box<Self>) {
        ::metrics::gauge!(format!("{}_active", self.name), self.labels.clone()).decrement(1.0);
        ::metrics::histogram!(format!("{}_duration_seconds", self.name), self.labels)
            .record(self.started.elapsed().as_secs_f64());
    }
}
