use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::Rng;
use tracing::info;

use timegate::config::Config;
use timegate::interceptor::{
    CallContext, CountDescriptor, InvocationCounter, InvocationDescriptor, InvocationTimer,
};
use timegate::server::{demo_registry, AppState};
use timegate::sink::{MemorySink, RecorderSink, TimerSink};
use timegate::{logging, metrics, metrics_push, server};

#[derive(Parser)]
#[command(name = "timegate")]
#[command(about = "Timed invocation interceptor demo with a Prometheus metrics pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo HTTP server with the Prometheus exporter
    Serve {
        /// Use the in-memory sink instead of the Prometheus recorder
        #[arg(long)]
        memory_sink: bool,
    },
    /// Generate demo traffic through every interception shape, then push
    Demo {
        /// Number of simulated invocations
        #[arg(long, default_value_t = 25)]
        iterations: usize,
    },
    /// Push the current exporter state to the push gateway once
    Push,
}

async fn run_demo(config: &Config, iterations: usize) -> anyhow::Result<()> {
    use futures::StreamExt;

    #[derive(Debug, thiserror::Error)]
    #[error("simulated downstream failure")]
    struct SimulatedFailure;

    let work_descriptor = InvocationDescriptor::new("demo_work_seconds")
        .describe("Simulated unit of work latency")
        .histogram(true);
    let stream_descriptor = InvocationDescriptor::new("demo_stream_seconds");
    let counted = CountDescriptor::new("demo_work");

    let mut registry = demo_registry();
    registry.register_timer("demo", "work", work_descriptor.clone());
    metrics::install(&registry)?;

    let sink: Arc<dyn TimerSink> = Arc::new(RecorderSink::new());
    let timer = InvocationTimer::new(sink.clone());
    let counter = InvocationCounter::new(sink);

    let ctx = CallContext::new("demo", "work");
    let mut failures = 0usize;
    for i in 0..iterations {
        let jitter = rand::thread_rng().gen_range(5..50u64);
        let should_fail = i % 7 == 3;

        let outcome = match timer.time_async(&work_descriptor, &ctx, || {
            Ok::<_, SimulatedFailure>(async move {
                tokio::time::sleep(Duration::from_millis(jitter)).await;
                if should_fail {
                    Err(SimulatedFailure)
                } else {
                    Ok(jitter)
                }
            })
        }) {
            Ok(future) => future.await,
            Err(err) => Err(err),
        };
        if outcome.is_err() {
            failures += 1;
        }

        let _ = counter.count(&counted, &ctx, || {
            if should_fail {
                Err(SimulatedFailure)
            } else {
                Ok(())
            }
        });
    }

    // Stream shape: consume a short timed stream end to end.
    let stream_ctx = CallContext::new("demo", "stream");
    let collected: Vec<Result<u32, SimulatedFailure>> = timer
        .time_stream(&stream_descriptor, &stream_ctx, || {
            tokio_stream::iter((0..5u32).map(Ok))
        })
        .collect()
        .await;

    println!(
        "📊 Demo complete: {iterations} timed invocations ({failures} failed), {} stream items",
        collected.len()
    );

    if config.metrics.pushgateway_url.is_some() {
        metrics_push::push_all_metrics(&config.metrics).await?;
        println!("✅ Pushed metrics to the push gateway");
    } else {
        println!("ℹ️  No push gateway configured; metrics stay in the local exporter");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve { memory_sink } => {
            let registry = demo_registry();
            let (sink, memory): (Arc<dyn TimerSink>, Option<MemorySink>) = if memory_sink {
                let memory = MemorySink::new();
                (Arc::new(memory.clone()), Some(memory))
            } else {
                metrics::install(&registry)?;
                (Arc::new(RecorderSink::new()), None)
            };

            if config.metrics.pushgateway_url.is_some() && !memory_sink {
                info!(
                    "Starting push gateway loop (every {}s)",
                    config.metrics.push_interval_seconds
                );
                tokio::spawn(metrics_push::run_push_loop(config.metrics.clone()));
            }

            let state = Arc::new(AppState::new(
                sink,
                registry,
                config.server.initial_delay_ms,
                memory,
            ));
            server::start_server(state, config.server.port).await?;
        }
        Commands::Demo { iterations } => {
            run_demo(&config, iterations).await?;
        }
        Commands::Push => {
            metrics_push::push_all_metrics(&config.metrics).await?;
            println!("✅ Pushed metrics to the push gateway");
        }
    }

    Ok(())
}
