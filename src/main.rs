use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod config;
mod fault;
mod handlers;
mod health;
mod metrics;
mod middleware;
mod server;

use config::Config;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
/// Built once at startup; nothing in the process reaches it through a global.
pub struct AppState {
    /// Rolling response-time window and baseline.
    pub monitor: Arc<metrics::PerformanceMonitor>,

    /// Time-gated telemetry push, nudged after every request.
    pub emitter: metrics::MetricsEmitter,

    /// Performance mode and the slow / CPU faults behind the product routes.
    pub faults: fault::FaultInjector,

    pub catalog: catalog::Catalog,

    pub memory: health::MemoryProbe,

    pub started_at: Instant,
}

impl AppState {
    /// Returns the state plus the receiving end of the telemetry queue,
    /// which the caller hands to a publisher.
    pub fn new(config: Config) -> (Arc<Self>, mpsc::Receiver<metrics::MetricsBatch>) {
        let (tx, rx) = mpsc::channel(config.thresholds.telemetry_queue.max(1));
        let monitor = Arc::new(metrics::PerformanceMonitor::new(config.thresholds));

        let state = Arc::new(Self {
            emitter: metrics::MetricsEmitter::new(monitor.clone(), tx),
            monitor,
            faults: fault::FaultInjector::new(&config.faults),
            catalog: catalog::Catalog::generate(),
            memory: health::MemoryProbe::new(),
            started_at: Instant::now(),
        });
        (state, rx)
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = Config::parse();
    init_tracing(&config);

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   🩺  PERFORMANCE TRIAGE DEMO                    ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    let listen = config.listen.clone();
    let mode = config.faults.performance_mode;

    // ── 1. Build shared state ────────────────────────────────────
    let (state, telemetry_rx) = AppState::new(config);
    info!(products = state.catalog.len(), ?mode, "catalog ready");

    // ── 2. Start the telemetry publisher ─────────────────────────
    let _publisher = metrics::spawn_publisher(telemetry_rx, Arc::new(metrics::LogSink));

    // ── 3. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&listen).await.map_err(|e| {
        error!(%listen, error = %e, "failed to bind");
        e
    })?;

    info!(%listen, "server listening");
    info!("health      → http://{listen}/health");
    info!("baseline    → http://{listen}/api/baseline");
    info!("products    → http://{listen}/api/products");

    axum::serve(listener, app).await.map_err(|e| {
        error!(error = %e, "server exited with error");
        e
    })
}

fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    if config.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
