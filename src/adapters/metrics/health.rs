//! Health Check Server - Liveness, Readiness and Metrics
//!
//! Exposes /live, /ready and /metrics via axum 0.7 for container
//! health checks and scraping. Readiness depends only on the fallback
//! store: the primary is optional, so its outage degrades but does not
//! take the service out of rotation.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::ports::store::DocumentStore;
use crate::usecases::data_provider::DataProvider;

/// Axum-based health check HTTP server.
pub struct HealthServer<P: DocumentStore, F: DocumentStore> {
    /// Provider whose backends are probed.
    provider: Arc<DataProvider<P, F>>,
    /// Bind address, e.g. `0.0.0.0:9090`.
    bind_address: String,
}

impl<P: DocumentStore, F: DocumentStore> HealthServer<P, F> {
    /// Create a new health server.
    pub fn new(provider: Arc<DataProvider<P, F>>, bind_address: impl Into<String>) -> Self {
        Self {
            provider,
            bind_address: bind_address.into(),
        }
    }

    /// Routes without a listener, for embedding or testing.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(Arc::clone(&self.provider))
    }

    /// Serve until a shutdown signal is broadcast.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!(address = %self.bind_address, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 while the fallback store is writable.
    async fn readiness(State(provider): State<Arc<DataProvider<P, F>>>) -> impl IntoResponse {
        let status = provider.status().await;
        let code = if status.fallback_healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (
            code,
            Json(json!({
                "primary": status.primary_available,
                "fallback": status.fallback_healthy,
            })),
        )
    }

    /// Prometheus text exposition.
    async fn metrics(State(provider): State<Arc<DataProvider<P, F>>>) -> impl IntoResponse {
        match provider.metrics().render() {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => {
                warn!(error = %e, "Failed to render metrics");
                (StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
        }
    }
}
