//! Demo HTTP server.
//!
//! Every route is wired through the interception layer: the basics routes
//! exercise the sync/async/stream timer shapes, the counting routes exercise
//! counted interception, and `/metrics` exposes the Prometheus exporter.
//! Descriptors come from the registry built in [`demo_registry`]; handlers
//! only name their call site.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::StreamBody;
use axum::extract::Path;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use hyper::Server;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::error::TimegateError;
use crate::interceptor::{
    CallContext, CountDescriptor, DescriptorRegistry, InvocationCounter, InvocationDescriptor,
    InvocationTimer,
};
use crate::sink::{MemorySink, Tag, TimerSink};

const OPTIONS: [&str; 4] = ["A", "B", "C", "D"];

/// Errors surfaced by the demo handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown option: {0}")]
    UnknownOption(String),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::UnknownOption(_) => {
                (StatusCode::NOT_FOUND, self.to_string()).into_response()
            }
        }
    }
}

/// Mutable demo state: how long the basics endpoints sleep, in ms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicsState {
    pub sleep: u64,
}

/// Shared handles for the demo routes.
pub struct AppState {
    pub timer: InvocationTimer,
    pub counter: InvocationCounter,
    pub registry: DescriptorRegistry,
    pub sink: Arc<dyn TimerSink>,
    pub delay_ms: AtomicU64,
    /// Present when serving with the in-memory sink; backs `/inspect`.
    pub memory: Option<MemorySink>,
}

impl AppState {
    pub fn new(
        sink: Arc<dyn TimerSink>,
        registry: DescriptorRegistry,
        initial_delay_ms: u64,
        memory: Option<MemorySink>,
    ) -> Self {
        // The skip predicate keeps health probes out of the timers.
        let timer = InvocationTimer::new(sink.clone()).with_skip(|ctx| ctx.target() == "health");
        let counter = InvocationCounter::new(sink.clone());
        Self {
            timer,
            counter,
            registry,
            sink,
            delay_ms: AtomicU64::new(initial_delay_ms),
            memory,
        }
    }

    async fn timed<F, T>(
        &self,
        ctx: &CallContext,
        call: impl FnOnce() -> Result<F, HandlerError>,
    ) -> Result<T, HandlerError>
    where
        F: Future<Output = Result<T, HandlerError>>,
    {
        match self.registry.timer(ctx) {
            Some(descriptor) => self.timer.time_async(descriptor, ctx, call)?.await,
            None => call()?.await,
        }
    }

    fn timed_sync<T>(
        &self,
        ctx: &CallContext,
        call: impl FnOnce() -> Result<T, HandlerError>,
    ) -> Result<T, HandlerError> {
        match self.registry.timer(ctx) {
            Some(descriptor) => self.timer.time(descriptor, ctx, call),
            None => call(),
        }
    }

    fn counted_sync<T>(
        &self,
        ctx: &CallContext,
        call: impl FnOnce() -> Result<T, HandlerError>,
    ) -> Result<T, HandlerError> {
        match self.registry.counter(ctx) {
            Some(descriptor) => self.counter.count(descriptor, ctx, call),
            None => call(),
        }
    }
}

/// Call-site descriptors for the demo routes, registered up front.
pub fn demo_registry() -> DescriptorRegistry {
    let mut registry = DescriptorRegistry::new();
    registry.register_timer(
        "basics",
        "home",
        InvocationDescriptor::new("basics_request_timing_home")
            .describe("Home endpoint latency")
            .histogram(true),
    );
    registry.register_timer(
        "basics",
        "random",
        InvocationDescriptor::new("basics_request_timing_random").histogram(true),
    );
    registry.register_timer(
        "basics",
        "state",
        InvocationDescriptor::new("basics_request_timing_state"),
    );
    registry.register_timer(
        "basics",
        "immediate",
        InvocationDescriptor::new("basics_request_timing_immediate"),
    );
    registry.register_timer(
        "basics",
        "slow",
        InvocationDescriptor::new("basics_request_slow").long_task(true),
    );
    registry.register_timer(
        "basics",
        "stream",
        InvocationDescriptor::new("basics_request_timing_stream")
            .describe("Chunked response latency, first poll to completion"),
    );
    registry.register_timer(
        "health",
        "check",
        InvocationDescriptor::new("health_check_timing"),
    );
    registry.register_counter(
        "counting",
        "option",
        CountDescriptor::new("options").static_tag("team", "demo-team"),
    );
    registry
}

/// Health check endpoint. Registered but skipped by the timer's predicate,
/// so probes never show up in the metrics.
async fn health(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let ctx = CallContext::new("health", "check");
    state
        .timed(&ctx, || {
            Ok(async {
                Ok(Json(serde_json::json!({
                    "status": "healthy",
                    "service": "timegate",
                    "version": env!("CARGO_PKG_VERSION")
                })))
            })
        })
        .await
}

async fn basics_home(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<BasicsState>, HandlerError> {
    let ctx = CallContext::new("basics", "home");
    let delay = state.delay_ms.load(Ordering::Relaxed);
    state
        .timed(&ctx, || {
            Ok(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Json(BasicsState { sleep: delay }))
            })
        })
        .await
}

async fn basics_random(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<BasicsState>, HandlerError> {
    let ctx = CallContext::new("basics", "random");
    let ceiling = state.delay_ms.load(Ordering::Relaxed).max(1);
    let delay = rand::thread_rng().gen_range(0..ceiling);
    state
        .timed(&ctx, || {
            Ok(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Json(BasicsState { sleep: ceiling }))
            })
        })
        .await
}

async fn basics_immediate(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<StatusCode, HandlerError> {
    let ctx = CallContext::new("basics", "immediate");
    state.timed(&ctx, || Ok(async { Ok(StatusCode::OK) })).await
}

/// Long-task route: the measurement is visible in the sink while the
/// request is still in flight.
async fn basics_slow(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<BasicsState>, HandlerError> {
    let ctx = CallContext::new("basics", "slow");
    let delay = state.delay_ms.load(Ordering::Relaxed);
    state
        .timed(&ctx, || {
            Ok(async move {
                tokio::time::sleep(Duration::from_millis(delay.saturating_mul(4))).await;
                Ok(Json(BasicsState { sleep: delay }))
            })
        })
        .await
}

async fn basics_set_state(
    Extension(state): Extension<Arc<AppState>>,
    Json(new_state): Json<BasicsState>,
) -> Result<Json<BasicsState>, HandlerError> {
    let ctx = CallContext::new("basics", "state");
    state.timed_sync(&ctx, || {
        state.delay_ms.store(new_state.sleep, Ordering::Relaxed);
        // mirror the live delay value as a gauge
        ::metrics::gauge!("basics_state_sleep").set(new_state.sleep as f64);
        Ok(Json(BasicsState {
            sleep: new_state.sleep,
        }))
    })
}

async fn basics_stream(Extension(state): Extension<Arc<AppState>>) -> Response {
    let ctx = CallContext::new("basics", "stream");
    let chunks = futures::StreamExt::then(tokio_stream::iter(0..8u32), |i| async move {
        tokio::time::sleep(Duration::from_millis(25)).await;
        Ok::<_, HandlerError>(format!("chunk {i}\n"))
    });
    match state.registry.timer(&ctx) {
        Some(descriptor) => {
            StreamBody::new(state.timer.time_stream(descriptor, &ctx, || chunks)).into_response()
        }
        None => StreamBody::new(chunks).into_response(),
    }
}

async fn counting_list() -> Json<Vec<&'static str>> {
    Json(OPTIONS.to_vec())
}

async fn count_option(
    Path(option): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<StatusCode, HandlerError> {
    let normalized = option.to_ascii_uppercase();
    let ctx = CallContext::new("counting", "option").attribute("option", normalized.clone());
    state.counted_sync(&ctx, || {
        if !OPTIONS.contains(&normalized.as_str()) {
            return Err(HandlerError::UnknownOption(option.clone()));
        }
        let _ = state.sink.increment(
            "demo_option_total",
            &[
                Tag::new("team", "demo-team"),
                Tag::new("option", normalized.clone()),
            ],
            1,
        );
        Ok(StatusCode::OK)
    })
}

async fn metrics_endpoint() -> Response {
    match crate::metrics::render() {
        Some(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Prometheus recorder not installed",
        )
            .into_response(),
    }
}

async fn inspect(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.memory {
        Some(sink) => (StatusCode::OK, sink.render()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            "serving with the Prometheus sink; see /metrics",
        )
            .into_response(),
    }
}

/// Create the HTTP server with all routes.
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/basics", get(basics_home).post(basics_set_state))
        .route("/basics/random", get(basics_random))
        .route("/basics/immediate", get(basics_immediate))
        .route("/basics/slow", get(basics_slow))
        .route("/basics/stream", get(basics_stream))
        .route("/counting", get(counting_list))
        .route("/counting/:option", get(count_option))
        .route("/metrics", get(metrics_endpoint))
        .route("/inspect", get(inspect))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port.
pub async fn start_server(state: Arc<AppState>, port: u16) -> Result<(), TimegateError> {
    let app = create_server(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("📈 Metrics:      http://localhost:{port}/metrics");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| TimegateError::Server(e.to_string()))?;

    Ok(())
}
