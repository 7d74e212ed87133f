//! Explicit call-site registration.
//!
//! Call sites are declared up front: a `(target, operation)` key mapped to
//! the descriptor that governs it. Handlers look their descriptor up at
//! dispatch time; an unregistered call runs untimed. There is no attribute
//! scanning or runtime type inspection anywhere.

use std::collections::HashMap;

use tracing::warn;

use super::context::CallContext;
use super::counter::CountDescriptor;
use super::descriptor::InvocationDescriptor;

type CallSiteKey = (&'static str, &'static str);

/// Descriptors keyed by call site, assembled at startup.
#[derive(Default)]
pub struct DescriptorRegistry {
    timers: HashMap<CallSiteKey, InvocationDescriptor>,
    counters: HashMap<CallSiteKey, CountDescriptor>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timed call site. The first registration wins; duplicates
    /// are logged and ignored.
    pub fn register_timer(
        &mut self,
        target: &'static str,
        operation: &'static str,
        descriptor: InvocationDescriptor,
    ) {
        if self.timers.contains_key(&(target, operation)) {
            warn!("duplicate timer registration for {}::{} ignored", target, operation);
            return;
        }
        self.timers.insert((target, operation), descriptor);
    }

    /// Register a counted call site, with the same first-wins policy.
    pub fn register_counter(
        &mut self,
        target: &'static str,
        operation: &'static str,
        descriptor: CountDescriptor,
    ) {
        if self.counters.contains_key(&(target, operation)) {
            warn!("duplicate counter registration for {}::{} ignored", target, operation);
            return;
        }
        self.counters.insert((target, operation), descriptor);
    }

    pub fn timer(&self, ctx: &CallContext) -> Option<&InvocationDescriptor> {
        self.timers.get(&(ctx.target(), ctx.operation()))
    }

    pub fn counter(&self, ctx: &CallContext) -> Option<&CountDescriptor> {
        self.counters.get(&(ctx.target(), ctx.operation()))
    }

    /// All registered timer descriptors, for exporter configuration.
    pub fn timers(&self) -> impl Iterator<Item = &InvocationDescriptor> {
        self.timers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_wins() {
        let mut registry = DescriptorRegistry::new();
        registry.register_timer("orders", "submit", InvocationDescriptor::new("first"));
        registry.register_timer("orders", "submit", InvocationDescriptor::new("second"));

        let ctx = CallContext::new("orders", "submit");
        let descriptor = registry.timer(&ctx).expect("registered");
        assert_eq!(descriptor.name(), "first");
    }

    #[test]
    fn unregistered_call_sites_resolve_to_none() {
        let registry = DescriptorRegistry::new();
        assert!(registry.timer(&CallContext::new("orders", "submit")).is_none());
        assert!(registry.counter(&CallContext::new("orders", "submit")).is_none());
    }
}
