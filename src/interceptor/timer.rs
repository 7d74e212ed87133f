//! The invocation timer interceptor.

use std::future::Future;
use std::sync::Arc;

use futures::Stream;

use crate::sink::{Tag, TimerSink};

use super::context::CallContext;
use super::descriptor::InvocationDescriptor;
use super::future::TimedFuture;
use super::outcome::{error_class, OUTCOME_NONE};
use super::sample::{LongTaskSample, PointSample, Sample};
use super::stream::TimedStream;

type SkipFn = Arc<dyn Fn(&CallContext) -> bool + Send + Sync>;
type ContextTagFn = Arc<dyn Fn(&CallContext) -> Vec<Tag> + Send + Sync>;

fn default_context_tags(ctx: &CallContext) -> Vec<Tag> {
    let mut tags = vec![
        Tag::new("target", ctx.target()),
        Tag::new("operation", ctx.operation()),
    ];
    tags.extend(ctx.attributes().iter().cloned());
    tags
}

/// Measures latency and outcome of units of work and publishes through an
/// explicit [`TimerSink`].
///
/// The shape of the work is stated by the caller: [`time`](Self::time) for
/// plain calls, [`time_async`](Self::time_async) for futures,
/// [`time_stream`](Self::time_stream) for streams. The interceptor never
/// changes what the caller observes — results and errors pass through
/// untouched, and every sink failure is discarded.
#[derive(Clone)]
pub struct InvocationTimer {
    sink: Arc<dyn TimerSink>,
    context_tags: ContextTagFn,
    skip: SkipFn,
}

impl InvocationTimer {
    pub fn new(sink: Arc<dyn TimerSink>) -> Self {
        Self {
            sink,
            context_tags: Arc::new(default_context_tags),
            skip: Arc::new(|_| false),
        }
    }

    /// Replace the per-invocation context tag function. The default tags
    /// every measurement with `target`, `operation`, and the context's
    /// attributes.
    pub fn with_context_tags(
        mut self,
        f: impl Fn(&CallContext) -> Vec<Tag> + Send + Sync + 'static,
    ) -> Self {
        self.context_tags = Arc::new(f);
        self
    }

    /// Invocations matching the predicate run untouched: no sample, no
    /// publication, no overhead beyond the predicate itself. Checked before
    /// anything else.
    pub fn with_skip(mut self, f: impl Fn(&CallContext) -> bool + Send + Sync + 'static) -> Self {
        self.skip = Arc::new(f);
        self
    }

    fn start_sample(&self, descriptor: &InvocationDescriptor, ctx: &CallContext) -> Option<Sample> {
        let context_tags = (self.context_tags)(ctx);
        if descriptor.is_long_task() {
            // A rejected registration skips instrumentation for this
            // invocation; the call itself must not notice.
            let spec = descriptor.resolve(ctx, &context_tags, None);
            match self.sink.start_long_task(&spec) {
                Ok(handle) => Some(Sample::LongTask(LongTaskSample::new(handle))),
                Err(_) => None,
            }
        } else {
            Some(Sample::Point(PointSample::start(
                self.sink.clone(),
                descriptor.clone(),
                ctx.clone(),
                context_tags,
            )))
        }
    }

    /// Time a synchronous call.
    pub fn time<T, E>(
        &self,
        descriptor: &InvocationDescriptor,
        ctx: &CallContext,
        call: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: std::error::Error + 'static,
    {
        if (self.skip)(ctx) {
            return call();
        }
        match self.start_sample(descriptor, ctx) {
            None => call(),
            Some(sample) => {
                // The sample publishes from its drop guard if `call` unwinds.
                let result = call();
                match &result {
                    Ok(_) => sample.complete(OUTCOME_NONE),
                    Err(err) => sample.complete(error_class(err)),
                }
                result
            }
        }
    }

    /// Time a deferred call.
    ///
    /// `call` produces the future; a failure to produce it counts as a
    /// synchronous failure and is recorded immediately. The returned future
    /// resolves to exactly what the wrapped future resolves to, and the
    /// measurement is published only at settlement — never before. A wrapped
    /// future dropped before settling loses its measurement.
    pub fn time_async<F, T, E>(
        &self,
        descriptor: &InvocationDescriptor,
        ctx: &CallContext,
        call: impl FnOnce() -> Result<F, E>,
    ) -> Result<TimedFuture<F>, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        if (self.skip)(ctx) {
            return Ok(TimedFuture::untimed(call()?));
        }
        let sample = self.start_sample(descriptor, ctx);
        match call() {
            Ok(future) => Ok(TimedFuture::new(future, sample.map(Sample::deferred))),
            Err(err) => {
                if let Some(sample) = sample {
                    sample.complete(error_class(&err));
                }
                Err(err)
            }
        }
    }

    /// Time a stream-returning call.
    ///
    /// Timing starts at the stream's first poll — consumption time, not call
    /// time — and ends at the first `Err` item or the end of the stream.
    /// Every item reaches the consumer unchanged; the terminal measurement
    /// is published before the terminal signal is returned. A wrapped stream
    /// dropped mid-flight loses its measurement.
    pub fn time_stream<S, T, E>(
        &self,
        descriptor: &InvocationDescriptor,
        ctx: &CallContext,
        call: impl FnOnce() -> S,
    ) -> TimedStream<S>
    where
        S: Stream<Item = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        if (self.skip)(ctx) {
            return TimedStream::untimed(call());
        }
        let timer = self.clone();
        let descriptor = descriptor.clone();
        let ctx = ctx.clone();
        TimedStream::new(call(), move || {
            timer.start_sample(&descriptor, &ctx).map(Sample::deferred)
        })
    }
}
