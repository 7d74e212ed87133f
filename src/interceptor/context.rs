//! Identity of an intercepted call.

use std::borrow::Cow;

use crate::sink::Tag;

/// Names the call being intercepted — a `target` component and an
/// `operation` on it — plus optional per-invocation attributes (route
/// parameters, peer identity, batch size).
///
/// The `(target, operation)` pair is the registry key; attributes flow into
/// the default context tags.
#[derive(Debug, Clone)]
pub struct CallContext {
    target: &'static str,
    operation: &'static str,
    attributes: Vec<Tag>,
}

impl CallContext {
    pub fn new(target: &'static str, operation: &'static str) -> Self {
        Self {
            target,
            operation,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(
        mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.attributes.push(Tag::new(key, value));
        self
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn attributes(&self) -> &[Tag] {
        &self.attributes
    }
}
