//! Dual Store - Entry Point
//!
//! Initializes configuration, logging and both document stores, then
//! serves health and metrics until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (+ env overrides) and validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create the JSON file store (fallback, always available)
//! 4. Create the MongoDB store and connect if a URI is configured
//! 5. Build the DataProvider over both stores
//! 6. Spawn health/metrics server (/live, /ready, /metrics)
//! 7. Wait for SIGINT → broadcast shutdown → disconnect primary

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use dual_store::adapters::metrics::{HealthServer, StoreMetrics};
use dual_store::adapters::mongo::MongoStore;
use dual_store::adapters::persistence::JsonFileStore;
use dual_store::config;
use dual_store::usecases::DataProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::var("DUAL_STORE_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        fallback_path = %config.fallback.path,
        "Starting dual store"
    );

    // ── 3. Fallback store ───────────────────────────────────
    let fallback = Arc::new(JsonFileStore::new(&config.fallback.path));

    // ── 4. Primary store (optional) ─────────────────────────
    let primary = Arc::new(MongoStore::new(
        config.service.name.clone(),
        Duration::from_millis(config.primary.server_selection_timeout_ms),
    ));
    match config.primary.enabled_uri() {
        Some(uri) => {
            primary.connect(uri, &config.primary.database).await;
        }
        None => warn!("No primary URI configured - running on the file store only"),
    }

    // ── 5. Data provider ────────────────────────────────────
    let metrics = Arc::new(StoreMetrics::new().context("Failed to register metrics")?);
    let provider = Arc::new(DataProvider::new(
        Arc::clone(&primary),
        Arc::clone(&fallback),
        metrics,
    ));

    let status = provider.status().await;
    info!(
        primary = status.primary_available,
        fallback = status.fallback_healthy,
        "Data provider ready"
    );

    // ── 6. Health/metrics server ────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    let health_handle = if config.metrics.enabled {
        let server = HealthServer::new(Arc::clone(&provider), config.metrics.bind_address.clone());
        let health_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(health_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }))
    } else {
        None
    };

    // ── 7. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());

    if let Some(handle) = health_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    primary.disconnect().await;

    info!(failures = provider.failures(), "Shutdown complete");
    Ok(())
}
