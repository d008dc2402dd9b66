//! hookbench webhook test bench.
//!
//! Main entry point. Loads configuration, opens the log store, starts the
//! forwarder and the HTTP server, and coordinates graceful shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use hookbench_api::{AppState, Config, LogStoreKind};
use hookbench_core::{storage, Clock, LogStore, MemoryLogStore, RealClock, SqliteLogStore};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

const FORWARD_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log);

    info!(
        addr = %format!("{}:{}", config.host, config.port),
        base_path = %config.base_path,
        log_store = ?config.log_store,
        forwarding = config.forward_url().is_some(),
        redirect = config.redirect_target().is_some(),
        ip_protection = config.ip_protection_enabled,
        "Starting hookbench"
    );

    load_key_file(&config).await;

    let (store, pool) = open_store(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());
    let addr = config.parse_server_addr()?;

    let (state, forward_worker) = AppState::start(config, store, clock)?;

    hookbench_api::start_server(state, addr).await.context("HTTP server failed")?;

    if let Some(worker) = forward_worker {
        info!("Waiting for queued forwards to finish");
        match tokio::time::timeout(FORWARD_DRAIN_TIMEOUT, worker).await {
            Ok(Ok(())) => info!("Forwarder drained"),
            Ok(Err(e)) => error!(error = %e, "Forwarder task failed"),
            Err(_) => warn!("Forward drain timed out, abandoning pending deliveries"),
        }
    }

    if let Some(pool) = pool {
        pool.close().await;
        info!("Database connections closed");
    }

    info!("hookbench shutdown complete");
    Ok(())
}

/// Initializes tracing, preferring `RUST_LOG` over the configured level.
fn init_tracing(configured: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Opens the configured log store. The pool is returned for shutdown.
async fn open_store(config: &Config) -> Result<(Arc<dyn LogStore>, Option<SqlitePool>)> {
    match config.log_store {
        LogStoreKind::Memory => {
            info!("Using in-memory log store");
            Ok((Arc::new(MemoryLogStore::new()), None))
        },
        LogStoreKind::Sqlite => {
            let pool = storage::connect(&config.database_url, config.database_max_connections)
                .await
                .context("Failed to open log database")?;
            storage::migrate(&pool).await.context("Failed to prepare log database")?;
            info!(database_url = %config.database_url, "SQLite log store ready");

            Ok((Arc::new(SqliteLogStore::new(pool.clone())), Some(pool)))
        },
    }
}

/// Reads the configured key file. Its contents are never used.
async fn load_key_file(config: &Config) {
    let Some(path) = config.key_path.as_deref().filter(|p| !p.is_empty()) else {
        return;
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => info!(path, bytes = bytes.len(), "Key file loaded"),
        Err(e) => warn!(path, error = %e, "Key file could not be read"),
    }
}
