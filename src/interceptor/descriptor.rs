//! What to measure for an intercepted call.

use std::borrow::Cow;
use std::sync::Arc;

use crate::sink::{Tag, TimerSpec};

use super::context::CallContext;
use super::outcome::OUTCOME_TAG;

/// Function deriving per-invocation tags from the call context. Evaluated
/// once per invocation, at publication time.
pub type TagFn = Arc<dyn Fn(&CallContext) -> Vec<Tag> + Send + Sync>;

/// Describes one intercepted call site: which metric to publish and how.
#[derive(Clone)]
pub struct InvocationDescriptor {
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    static_tags: Vec<Tag>,
    dynamic_tags: Option<TagFn>,
    histogram: bool,
    long_task: bool,
}

impl InvocationDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            description: None,
            static_tags: Vec::new(),
            dynamic_tags: None,
            histogram: false,
            long_task: false,
        }
    }

    pub fn describe(mut self, text: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn static_tag(
        mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.static_tags.push(Tag::new(key, value));
        self
    }

    pub fn dynamic_tags(
        mut self,
        f: impl Fn(&CallContext) -> Vec<Tag> + Send + Sync + 'static,
    ) -> Self {
        self.dynamic_tags = Some(Arc::new(f));
        self
    }

    /// Request a latency histogram for this metric.
    pub fn histogram(mut self, enabled: bool) -> Self {
        self.histogram = enabled;
        self
    }

    /// Measure as a long-task timer: duration visible while still in flight,
    /// no point measurement on completion.
    pub fn long_task(mut self, enabled: bool) -> Self {
        self.long_task = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_long_task(&self) -> bool {
        self.long_task
    }

    pub fn wants_histogram(&self) -> bool {
        self.histogram
    }

    /// Resolve the final timer identity for one invocation.
    ///
    /// Merge order: static tags, then the outcome tag, then context tags,
    /// then dynamic tags; later entries win on key collision. Long-task
    /// registrations pass `outcome: None` — the outcome is unknown when the
    /// sample starts.
    pub(crate) fn resolve(
        &self,
        ctx: &CallContext,
        context_tags: &[Tag],
        outcome: Option<&'static str>,
    ) -> TimerSpec {
        let mut tags: Vec<Tag> = self.static_tags.clone();
        if let Some(outcome) = outcome {
            tags.push(Tag::new(OUTCOME_TAG, outcome));
        }
        tags.extend(context_tags.iter().cloned());
        if let Some(dynamic) = &self.dynamic_tags {
            tags.extend(dynamic(ctx));
        }
        TimerSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: merge_tags(tags),
            histogram: self.histogram,
        }
    }
}

/// Collapse duplicate keys, keeping the last value for each key at the
/// position of its first appearance.
pub(crate) fn merge_tags(tags: Vec<Tag>) -> Vec<Tag> {
    let mut merged: Vec<Tag> = Vec::with_capacity(tags.len());
    for tag in tags {
        if let Some(existing) = merged.iter_mut().find(|t| t.key() == tag.key()) {
            *existing = tag;
        } else {
            merged.push(tag);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::outcome::OUTCOME_NONE;

    fn tag_value<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
        tags.iter().find(|t| t.key() == key).map(|t| t.value())
    }

    #[test]
    fn resolve_merges_in_precedence_order() {
        let descriptor = InvocationDescriptor::new("orders_submit_seconds")
            .static_tag("team", "checkout")
            .static_tag(OUTCOME_TAG, "shadowed")
            .dynamic_tags(|ctx| vec![Tag::new("operation", format!("dyn_{}", ctx.operation()))]);

        let ctx = CallContext::new("orders", "submit");
        let context_tags = vec![Tag::new("target", "orders"), Tag::new("operation", "submit")];
        let spec = descriptor.resolve(&ctx, &context_tags, Some(OUTCOME_NONE));

        assert_eq!(spec.name, "orders_submit_seconds");
        assert_eq!(tag_value(&spec.tags, "team"), Some("checkout"));
        // outcome overrides the static entry, dynamic overrides context
        assert_eq!(tag_value(&spec.tags, OUTCOME_TAG), Some(OUTCOME_NONE));
        assert_eq!(tag_value(&spec.tags, "operation"), Some("dyn_submit"));
        assert_eq!(tag_value(&spec.tags, "target"), Some("orders"));
    }

    #[test]
    fn long_task_resolution_has_no_outcome_tag() {
        let descriptor = InvocationDescriptor::new("rebuild").long_task(true);
        let ctx = CallContext::new("index", "rebuild");
        let spec = descriptor.resolve(&ctx, &[], None);
        assert_eq!(tag_value(&spec.tags, OUTCOME_TAG), None);
    }
}
