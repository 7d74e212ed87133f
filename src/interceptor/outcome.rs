//! Outcome classification for finished invocations.

use std::error::Error as StdError;

use thiserror::Error;

/// Tag key classifying how an invocation ended.
pub const OUTCOME_TAG: &str = "exception";

/// Outcome value for an invocation that completed without error.
pub const OUTCOME_NONE: &str = "none";

/// Last path segment of a type name, without generic parameters.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Label published in the outcome tag for a failed invocation: the short
/// type name of the error. A [`CompletionError`] instead reports the class
/// of the failure it wraps, so the completion machinery's own wrapper never
/// shows up in dashboards.
pub fn error_class<E>(err: &E) -> &'static str
where
    E: StdError + 'static,
{
    if let Some(wrapped) = (err as &dyn StdError).downcast_ref::<CompletionError>() {
        wrapped.cause_class()
    } else {
        short_type_name::<E>()
    }
}

/// Failure surfaced by deferred-completion machinery rather than the wrapped
/// call itself — a spawned task that died, a channel that closed before
/// yielding. Wraps the underlying failure once and remembers its class while
/// the concrete type is still known; the outcome tag reports that class, not
/// the wrapper's.
#[derive(Debug, Error)]
#[error("deferred call failed: {source}")]
pub struct CompletionError {
    class: &'static str,
    source: Box<dyn StdError + Send + Sync>,
}

impl CompletionError {
    pub fn new<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            class: short_type_name::<E>(),
            source: Box::new(source),
        }
    }

    /// Class label of the wrapped failure.
    pub fn cause_class(&self) -> &'static str {
        self.class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("broken state")]
    struct BrokenState;

    #[test]
    fn short_names_strip_paths_and_generics() {
        assert_eq!(short_type_name::<BrokenState>(), "BrokenState");
        assert_eq!(short_type_name::<std::io::Error>(), "Error");
        assert_eq!(short_type_name::<Vec<BrokenState>>(), "Vec");
    }

    #[test]
    fn plain_errors_report_their_own_class() {
        assert_eq!(error_class(&BrokenState), "BrokenState");
    }

    #[test]
    fn completion_wrapper_reports_the_cause() {
        let wrapped = CompletionError::new(BrokenState);
        assert_eq!(error_class(&wrapped), "BrokenState");
        assert!(StdError::source(&wrapped).is_some());
    }
}
