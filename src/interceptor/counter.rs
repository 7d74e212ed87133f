//! The invocation counter interceptor.
//!
//! The counted analog of `InvocationTimer`: publishes one counter increment
//! per completed invocation, tagged with the result classification, instead
//! of a duration. Same skip policy, same swallow-all publication.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use crate::sink::{Tag, TimerSink};

use super::context::CallContext;
use super::descriptor::merge_tags;
use super::outcome::{error_class, OUTCOME_NONE, OUTCOME_TAG};

/// Tag key for the coarse result classification.
pub const RESULT_TAG: &str = "result";

const RESULT_SUCCESS: &str = "success";
const RESULT_FAILURE: &str = "failure";

type SkipFn = Arc<dyn Fn(&CallContext) -> bool + Send + Sync>;
type ContextTagFn = Arc<dyn Fn(&CallContext) -> Vec<Tag> + Send + Sync>;

/// Describes one counted call site.
#[derive(Clone)]
pub struct CountDescriptor {
    name: Cow<'static, str>,
    static_tags: Vec<Tag>,
    failures_only: bool,
}

impl CountDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            static_tags: Vec::new(),
            failures_only: false,
        }
    }

    pub fn static_tag(
        mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.static_tags.push(Tag::new(key, value));
        self
    }

    /// Count only failed invocations.
    pub fn failures_only(mut self, enabled: bool) -> Self {
        self.failures_only = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Counts invocations and their outcomes through an explicit [`TimerSink`].
#[derive(Clone)]
pub struct InvocationCounter {
    sink: Arc<dyn TimerSink>,
    context_tags: ContextTagFn,
    skip: SkipFn,
}

impl InvocationCounter {
    pub fn new(sink: Arc<dyn TimerSink>) -> Self {
        Self {
            sink,
            context_tags: Arc::new(|ctx| {
                let mut tags = vec![
                    Tag::new("target", ctx.target()),
                    Tag::new("operation", ctx.operation()),
                ];
                tags.extend(ctx.attributes().iter().cloned());
                tags
            }),
            skip: Arc::new(|_| false),
        }
    }

    pub fn with_context_tags(
        mut self,
        f: impl Fn(&CallContext) -> Vec<Tag> + Send + Sync + 'static,
    ) -> Self {
        self.context_tags = Arc::new(f);
        self
    }

    pub fn with_skip(mut self, f: impl Fn(&CallContext) -> bool + Send + Sync + 'static) -> Self {
        self.skip = Arc::new(f);
        self
    }

    /// Count a synchronous call.
    pub fn count<T, E>(
        &self,
        descriptor: &CountDescriptor,
        ctx: &CallContext,
        call: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: std::error::Error + 'static,
    {
        if (self.skip)(ctx) {
            return call();
        }
        let result = call();
        self.publish_outcome(descriptor, ctx, &result);
        result
    }

    /// Count a deferred call. The increment happens at settlement; a future
    /// dropped before settling counts nothing. A failure to produce the
    /// future counts as a failed invocation.
    pub async fn count_async<F, T, E>(
        &self,
        descriptor: &CountDescriptor,
        ctx: &CallContext,
        call: impl FnOnce() -> Result<F, E>,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        if (self.skip)(ctx) {
            return call()?.await;
        }
        let future = match call() {
            Ok(future) => future,
            Err(err) => {
                self.publish(descriptor, ctx, RESULT_FAILURE, error_class(&err));
                return Err(err);
            }
        };
        let result = future.await;
        self.publish_outcome(descriptor, ctx, &result);
        result
    }

    fn publish_outcome<T, E>(
        &self,
        descriptor: &CountDescriptor,
        ctx: &CallContext,
        result: &Result<T, E>,
    ) where
        E: std::error::Error + 'static,
    {
        match result {
            Ok(_) if descriptor.failures_only => {}
            Ok(_) => self.publish(descriptor, ctx, RESULT_SUCCESS, OUTCOME_NONE),
            Err(err) => self.publish(descriptor, ctx, RESULT_FAILURE, error_class(err)),
        }
    }

    fn publish(
        &self,
        descriptor: &CountDescriptor,
        ctx: &CallContext,
        result: &'static str,
        outcome: &'static str,
    ) {
        let mut tags = descriptor.static_tags.clone();
        tags.push(Tag::new(RESULT_TAG, result));
        tags.push(Tag::new(OUTCOME_TAG, outcome));
        tags.extend((self.context_tags)(ctx));
        let tags = merge_tags(tags);
        // Best-effort, same as the timer.
        let _ = self.sink.increment(descriptor.name(), &tags, 1);
    }
}
