use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use timegate::server::{create_server, demo_registry, AppState};
use timegate::sink::{MemorySink, Tag, TimerSink};

fn state_with_memory(delay_ms: u64) -> (MemorySink, Arc<AppState>) {
    let sink = MemorySink::new();
    let state = Arc::new(AppState::new(
        Arc::new(sink.clone()) as Arc<dyn TimerSink>,
        demo_registry(),
        delay_ms,
        Some(sink.clone()),
    ));
    (sink, state)
}

fn tag<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter().find(|t| t.key() == key).map(|t| t.value())
}

#[tokio::test]
async fn basics_home_is_timed() -> Result<()> {
    let (sink, state) = state_with_memory(10);
    let app = create_server(state);

    let response = app
        .oneshot(Request::builder().uri("/basics").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let measurements = sink.measurements();
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].name, "basics_request_timing_home");
    assert_eq!(tag(&measurements[0].tags, "exception"), Some("none"));
    assert_eq!(tag(&measurements[0].tags, "target"), Some("basics"));
    Ok(())
}

#[tokio::test]
async fn health_probes_are_skipped() -> Result<()> {
    let (sink, state) = state_with_memory(10);
    let app = create_server(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(sink.measurements().is_empty());
    Ok(())
}

#[tokio::test]
async fn posting_state_updates_the_delay() -> Result<()> {
    let (sink, state) = state_with_memory(200);
    let app = create_server(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/basics")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"sleep":5}"#))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let measurements = sink.measurements();
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].name, "basics_request_timing_state");

    let response = app
        .oneshot(Request::builder().uri("/basics").body(Body::empty())?)
        .await?;
    let body = hyper::body::to_bytes(response.into_body()).await?;
    let value: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(value["sleep"], 5);
    Ok(())
}

#[tokio::test]
async fn stream_route_times_full_consumption() -> Result<()> {
    let (sink, state) = state_with_memory(10);
    let app = create_server(state);

    let response = app
        .oneshot(Request::builder().uri("/basics/stream").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = hyper::body::to_bytes(response.into_body()).await?;
    let text = String::from_utf8(body.to_vec())?;
    assert_eq!(text.lines().count(), 8);

    let measurements = sink.measurements();
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].name, "basics_request_timing_stream");
    assert!(measurements[0].duration >= Duration::from_millis(150));
    Ok(())
}

#[tokio::test]
async fn counting_options_count_success_and_failure() -> Result<()> {
    let (sink, state) = state_with_memory(10);
    let app = create_server(state);

    let ok = app
        .clone()
        .oneshot(Request::builder().uri("/counting/a").body(Body::empty())?)
        .await?;
    assert_eq!(ok.status(), StatusCode::OK);

    let missing = app
        .oneshot(Request::builder().uri("/counting/z").body(Body::empty())?)
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let counters = sink.counters();
    let success = counters
        .iter()
        .find(|c| c.name == "options" && tag(&c.tags, "result") == Some("success"))
        .expect("success counter");
    assert_eq!(success.count, 1);
    assert_eq!(tag(&success.tags, "team"), Some("demo-team"));
    assert_eq!(tag(&success.tags, "option"), Some("A"));

    let failure = counters
        .iter()
        .find(|c| c.name == "options" && tag(&c.tags, "result") == Some("failure"))
        .expect("failure counter");
    assert_eq!(tag(&failure.tags, "exception"), Some("HandlerError"));

    let per_option = counters
        .iter()
        .find(|c| c.name == "demo_option_total")
        .expect("per-option counter");
    assert_eq!(per_option.count, 1);
    assert_eq!(tag(&per_option.tags, "option"), Some("A"));
    Ok(())
}

#[tokio::test]
async fn slow_route_uses_a_long_task_sample() -> Result<()> {
    let (sink, state) = state_with_memory(25);
    let app = create_server(state);

    let response = app
        .oneshot(Request::builder().uri("/basics/slow").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(sink.active_long_tasks(), 0);
    let finished = sink.finished_long_tasks();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].name, "basics_request_slow");
    // no point measurement for the long-task route
    assert!(sink.measurements().is_empty());
    Ok(())
}

#[tokio::test]
async fn inspect_renders_the_memory_sink() -> Result<()> {
    let (_sink, state) = state_with_memory(10);
    let app = create_server(state);

    let _ = app
        .clone()
        .oneshot(Request::builder().uri("/basics/immediate").body(Body::empty())?)
        .await?;

    let response = app
        .oneshot(Request::builder().uri("/inspect").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await?;
    let text = String::from_utf8(body.to_vec())?;
    assert!(text.contains("basics_request_timing_immediate"));
    Ok(())
}
