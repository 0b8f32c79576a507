//! Web server module.

mod handlers;
mod owner;

pub use handlers::*;
pub use owner::*;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::metrics::{MetricsRegistry, MetricsSink};
use crate::series::PrometheusClient;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub sink: Arc<MetricsSink>,
    pub metrics: MetricsRegistry,
    pub series: PrometheusClient,
}

/// Web server for DevPulse.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        store: Arc<Store>,
        sink: Arc<MetricsSink>,
        metrics: MetricsRegistry,
        series: PrometheusClient,
    ) -> Self {
        Self {
            state: AppState {
                config,
                store,
                sink,
                metrics,
                series,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(handlers::handle_root))
            // Scrape endpoint
            .route("/metrics", get(handlers::handle_metrics))
            // API endpoints
            .route(
                "/api/sites",
                get(handlers::handle_get_sites).post(handlers::handle_create_site),
            )
            .route("/api/sites/{id}", delete(handlers::handle_delete_site))
            .route("/api/sites/{id}/metrics", get(handlers::handle_site_metrics))
            .route("/api/sites/{id}/history", get(handlers::handle_site_history))
            .route("/api/sites/{id}/analytics", get(handlers::handle_site_analytics))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
