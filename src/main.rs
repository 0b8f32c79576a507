//! DevPulse - Website Uptime Monitoring
//!
//! Periodically checks every registered site, exposes the results as
//! Prometheus gauges, and serves uptime history derived from the scraped
//! series.

mod analysis;
mod config;
mod db;
mod metrics;
mod probe;
mod scheduler;
mod series;
mod web;

use config::ServerConfig;
use db::Store;
use metrics::{MetricsRegistry, MetricsSink};
use probe::HttpProber;
use scheduler::{Scheduler, SchedulerConfig};
use series::PrometheusClient;
use web::Server;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("devpulse=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting DevPulse on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);
    tracing::info!("Reading history from {}", cfg.prometheus_url);

    // Initialize site registry
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let sink = Arc::new(MetricsSink::new());
    let metrics = MetricsRegistry::new(sink.clone())?;
    let prober = HttpProber::new(cfg.probe_timeout)?;
    let series = PrometheusClient::new(&cfg.prometheus_url, Duration::from_secs(10))?;

    // Start scheduler
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        prober,
        sink.clone(),
        SchedulerConfig::from(&cfg),
    ));
    let handle = scheduler.start();

    // Serve until Ctrl-C
    let server = Server::new(cfg, store, sink, metrics, series);
    let served = server.start(shutdown_signal()).await;

    handle.stop().await;
    tracing::info!("Shutdown complete");

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
