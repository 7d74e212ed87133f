//! Prometheus exporter plumbing.
//!
//! Installs the `metrics` facade recorder once and keeps its handle for the
//! `/metrics` endpoint and the push gateway client. Descriptors that request
//! a histogram get explicit latency buckets configured up front, before the
//! recorder sees its first measurement.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

use crate::error::{Result, TimegateError};
use crate::interceptor::DescriptorRegistry;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Latency buckets for histogram-flagged timers, in seconds.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder. Call once at startup, before any
/// measurement is published.
pub fn install(registry: &DescriptorRegistry) -> Result<()> {
    let mut builder = PrometheusBuilder::new();
    for descriptor in registry.timers().filter(|d| d.wants_histogram()) {
        builder = builder
            .set_buckets_for_metric(
                Matcher::Full(descriptor.name().to_string()),
                LATENCY_BUCKETS,
            )
            .map_err(|e| TimegateError::Metrics(e.to_string()))?;
    }

    let handle = builder
        .install_recorder()
        .map_err(|e| TimegateError::Metrics(e.to_string()))?;

    if HANDLE.set(handle).is_err() {
        info!("Prometheus recorder already installed; keeping the existing handle");
    } else {
        info!("Prometheus recorder installed");
    }
    Ok(())
}

/// Rendered exposition text, if the recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}
