//! Push gateway client.
//!
//! Renders the exporter state and POSTs the text exposition to the push
//! gateway, for runs too short-lived to be scraped. Pushing is
//! fire-and-forget: failures are logged and never affect the serving path.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::MetricsConfig;
use crate::error::{Result, TimegateError};

/// Push the full exporter state to the push gateway once.
pub async fn push_all_metrics(config: &MetricsConfig) -> Result<()> {
    let Some(base) = config.pushgateway_url.as_deref() else {
        return Err(TimegateError::Push("no push gateway configured".to_string()));
    };

    let push_url = format!(
        "{}/metrics/job/{}/instance/{}",
        base.trim_end_matches('/'),
        config.job,
        config.instance
    );

    // Add a timestamp marker so dashboards can track push freshness
    let timestamp = chrono::Utc::now().timestamp_millis();
    let mut body = format!(
        "# HELP timegate_push_timestamp_ms Last push timestamp\n\
         # TYPE timegate_push_timestamp_ms gauge\n\
         timegate_push_timestamp_ms {}\n",
        timestamp
    );

    match crate::metrics::render() {
        Some(rendered) if !rendered.is_empty() => body.push_str(&rendered),
        _ => warn!("Prometheus recorder not installed or empty; pushing marker only"),
    }

    let client = reqwest::Client::new();
    let response = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(TimegateError::Push(format!(
            "push gateway returned {status}: {text}"
        )));
    }

    info!(
        "Pushed metrics to the push gateway for instance={}",
        config.instance
    );
    Ok(())
}

/// Push on an interval until the process exits.
pub async fn run_push_loop(config: MetricsConfig) {
    let period = Duration::from_secs(config.push_interval_seconds.max(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if let Err(e) = push_all_metrics(&config).await {
            warn!("Metrics push failed: {}", e);
        }
    }
}
