//! In-memory sink for tests and the `/inspect` endpoint.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{LongTaskHandle, SinkError, Tag, TimerSink, TimerSpec};

/// One finished point measurement captured by [`MemorySink`].
#[derive(Debug, Clone)]
pub struct Measurement {
    pub name: String,
    pub tags: Vec<Tag>,
    pub duration: Duration,
    pub histogram: bool,
}

/// One finished long-task window.
#[derive(Debug, Clone)]
pub struct LongTaskRecord {
    pub name: String,
    pub tags: Vec<Tag>,
    pub duration: Duration,
}

/// One counter with its accumulated count.
#[derive(Debug, Clone)]
pub struct CounterRecord {
    pub name: String,
    pub tags: Vec<Tag>,
    pub count: u64,
}

#[derive(Debug, Default)]
struct State {
    measurements: Vec<Measurement>,
    counters: Vec<CounterRecord>,
    active_long_tasks: usize,
    finished_long_tasks: Vec<LongTaskRecord>,
    fail_all: bool,
}

/// Sink that keeps everything it is handed, in process. Cloning shares the
/// captured state, so a test can hold one clone and hand the other to an
/// interceptor.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<State>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent sink operation fail, for exercising the
    /// swallow-all publication policy.
    pub fn fail_all(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_all = true;
        }
    }

    pub fn measurements(&self) -> Vec<Measurement> {
        self.state
            .lock()
            .map(|state| state.measurements.clone())
            .unwrap_or_default()
    }

    pub fn counters(&self) -> Vec<CounterRecord> {
        self.state
            .lock()
            .map(|state| state.counters.clone())
            .unwrap_or_default()
    }

    pub fn active_long_tasks(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.active_long_tasks)
            .unwrap_or_default()
    }

    pub fn finished_long_tasks(&self) -> Vec<LongTaskRecord> {
        self.state
            .lock()
            .map(|state| state.finished_long_tasks.clone())
            .unwrap_or_default()
    }

    /// Plain-text summary for the `/inspect` endpoint.
    pub fn render(&self) -> String {
        let Ok(state) = self.state.lock() else {
            return String::new();
        };
        let mut out = String::new();
        out.push_str(&format!("measurements: {}\n", state.measurements.len()));
        for m in &state.measurements {
            out.push_str(&format!(
                "  {} {:.6}s {}\n",
                m.name,
                m.duration.as_secs_f64(),
                format_tags(&m.tags)
            ));
        }
        out.push_str(&format!("counters: {}\n", state.counters.len()));
        for c in &state.counters {
            out.push_str(&format!("  {} {} {}\n", c.name, c.count, format_tags(&c.tags)));
        }
        out.push_str(&format!(
            "long tasks: {} active, {} finished\n",
            state.active_long_tasks,
            state.finished_long_tasks.len()
        ));
        for t in &state.finished_long_tasks {
            out.push_str(&format!(
                "  {} {:.6}s {}\n",
                t.name,
                t.duration.as_secs_f64(),
                format_tags(&t.tags)
            ));
        }
        out
    }
}

fn format_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| format!("{}={}", tag.key(), tag.value()))
        .collect::<Vec<_>>()
        .join(",")
}

impl TimerSink for MemorySink {
    fn record(&self, spec: &TimerSpec, duration: Duration) -> Result<(), SinkError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(SinkError::new(spec.name.to_string(), "sink state poisoned"));
        };
        if state.fail_all {
            return Err(SinkError::new(spec.name.to_string(), "sink set to fail"));
        }
        state.measurements.push(Measurement {
            name: spec.name.to_string(),
            tags: spec.tags.clone(),
            duration,
            histogram: spec.histogram,
        });
        Ok(())
    }

    fn start_long_task(&self, spec: &TimerSpec) -> Result<Box<dyn LongTaskHandle>, SinkError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(SinkError::new(spec.name.to_string(), "sink state poisoned"));
        };
        if state.fail_all {
            return Err(SinkError::new(spec.name.to_string(), "sink set to fail"));
        }
        state.active_long_tasks += 1;
        Ok(Box::new(MemoryLongTask {
            state: self.state.clone(),
            name: spec.name.to_string(),
            tags: spec.tags.clone(),
            started: Instant::now(),
        }))
    }

    fn increment(&self, name: &str, tags: &[Tag], by: u64) -> Result<(), SinkError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(SinkError::new(name, "sink state poisoned"));
        };
        if state.fail_all {
            return Err(SinkError::new(name, "sink set to fail"));
        }
        if let Some(existing) = state
            .counters
            .iter_mut()
            .find(|c| c.name == name && c.tags == tags)
        {
            existing.count += by;
        } else {
            state.counters.push(CounterRecord {
                name: name.to_string(),
                tags: tags.to_vec(),
                count: by,
            });
        }
        Ok(())
    }
}

struct MemoryLongTask {
    state: Arc<Mutex<State>>,
    name: String,
    tags: Vec<Tag>,
    started: Instant,
}

impl LongTaskHandle for MemoryLongTask {
    fn stop(self: Box<Self>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.active_long_tasks = state.active_long_tasks.saturating_sub(1);
        state.finished_long_tasks.push(LongTaskRecord {
            name: self.name,
            tags: self.tags,
            duration: self.started.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &'static str) -> TimerSpec {
        TimerSpec {
            name: name.into(),
            description: None,
            tags: vec![Tag::new("target", "orders")],
            histogram: false,
        }
    }

    #[test]
    fn records_measurements_and_counters() {
        let sink = MemorySink::new();
        sink.record(&spec("m"), Duration::from_millis(5)).unwrap();
        sink.increment("hits", &[Tag::new("route", "home")], 1).unwrap();
        sink.increment("hits", &[Tag::new("route", "home")], 2).unwrap();

        assert_eq!(sink.measurements().len(), 1);
        let counters = sink.counters();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].count, 3);
    }

    #[test]
    fn long_task_tracks_active_count() {
        let sink = MemorySink::new();
        let handle = sink.start_long_task(&spec("rebuild")).unwrap();
        assert_eq!(sink.active_long_tasks(), 1);
        handle.stop();
        assert_eq!(sink.active_long_tasks(), 0);
        assert_eq!(sink.finished_long_tasks().len(), 1);
    }

    #[test]
    fn fail_all_rejects_everything() {
        let sink = MemorySink::new();
        sink.fail_all();
        assert!(sink.record(&spec("m"), Duration::ZERO).is_err());
        assert!(sink.start_long_task(&spec("m")).is_err());
        assert!(sink.increment("hits", &[], 1).is_err());
        assert!(sink.measurements().is_empty());
    }
}
