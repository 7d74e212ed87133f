//! Pass-through future wrapper that publishes on settlement.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

use super::outcome::{error_class, OUTCOME_NONE};
use super::sample::Sample;

pin_project! {
    /// Future returned by `InvocationTimer::time_async`.
    ///
    /// Resolves to exactly what the wrapped future resolves to. The sample
    /// is finalized when the future settles; dropping the future before
    /// then loses the measurement — nothing is published and nothing is
    /// guessed.
    #[must_use = "futures do nothing unless polled"]
    pub struct TimedFuture<F> {
        #[pin]
        inner: F,
        sample: Option<Sample>,
    }
}

impl<F> TimedFuture<F> {
    pub(crate) fn new(inner: F, sample: Option<Sample>) -> Self {
        Self { inner, sample }
    }

    pub(crate) fn untimed(inner: F) -> Self {
        Self {
            inner,
            sample: None,
        }
    }
}

impl<F, T, E> Future for TimedFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(output) => {
                if let Some(sample) = this.sample.take() {
                    match &output {
                        Ok(_) => sample.complete(OUTCOME_NONE),
                        Err(err) => sample.complete(error_class(err)),
                    }
                }
                Poll::Ready(output)
            }
        }
    }
}
