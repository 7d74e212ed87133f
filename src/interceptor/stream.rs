//! Pass-through stream wrapper that publishes at termination.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;

use super::outcome::{error_class, OUTCOME_NONE};
use super::sample::Sample;

type Starter = Box<dyn FnOnce() -> Option<Sample> + Send>;

pin_project! {
    /// Stream returned by `InvocationTimer::time_stream`.
    ///
    /// Forwards every item unchanged, in order. The sample starts at the
    /// first poll and is finalized at the first `Err` item or the end of
    /// the stream, whichever comes first; the measurement is published
    /// before the terminal signal is returned to the consumer. Items after
    /// the first `Err` still pass through, but nothing publishes twice.
    /// Dropping the stream mid-flight loses the measurement.
    #[must_use = "streams do nothing unless polled"]
    pub struct TimedStream<S> {
        #[pin]
        inner: S,
        starter: Option<Starter>,
        sample: Option<Sample>,
    }
}

impl<S> TimedStream<S> {
    pub(crate) fn new(inner: S, starter: impl FnOnce() -> Option<Sample> + Send + 'static) -> Self {
        Self {
            inner,
            starter: Some(Box::new(starter)),
            sample: None,
        }
    }

    pub(crate) fn untimed(inner: S) -> Self {
        Self {
            inner,
            starter: None,
            sample: None,
        }
    }
}

impl<S, T, E> Stream for TimedStream<S>
where
    S: Stream<Item = Result<T, E>>,
    E: std::error::Error + 'static,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if let Some(starter) = this.starter.take() {
            *this.sample = starter();
        }
        match this.inner.poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Some(Ok(item))),
            Poll::Ready(Some(Err(err))) => {
                if let Some(sample) = this.sample.take() {
                    sample.complete(error_class(&err));
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if let Some(sample) = this.sample.take() {
                    sample.complete(OUTCOME_NONE);
                }
                Poll::Ready(None)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
