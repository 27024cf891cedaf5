//! Custodia compliance ledger worker runtime.

#![forbid(unsafe_code)]

mod services;
mod worker_config;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use custodia_core::{AppError, AppResult};
use custodia_infrastructure::MIGRATOR;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::services::build_worker_services;
use crate::worker_config::{StoreBackend, WorkerConfig};

const POLL_FAILURE_BACKOFF: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = connect_pool(&config).await?;
            MIGRATOR.run(&pool).await.map_err(|error| {
                AppError::Internal(format!("failed to run database migrations: {error}"))
            })?;
            Some(pool)
        }
        StoreBackend::InMemory => {
            warn!("ledger store is in memory, tracked data is lost on exit");
            None
        }
    };

    let services = build_worker_services(pool.clone(), &config).await?;
    services.transport.ensure_consumer_groups().await?;

    info!(
        consumer_group = %config.consumer_group,
        consumer_name = %config.consumer_name,
        store_backend = ?config.store_backend,
        cache_backend = ?config.cache_backend,
        batch_size = config.consumer_batch_size,
        default_retention_days = config.policy.default_retention_days,
        "custodia-worker started"
    );

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    tokio::spawn(watch_for_shutdown(shutdown_requested.clone()));

    while !shutdown_requested.load(Ordering::SeqCst) {
        match services.consumer.run_batch().await {
            Ok(summary) if summary.received > 0 => info!(
                received = summary.received,
                applied = summary.applied,
                deduplicated = summary.deduplicated,
                ignored = summary.ignored,
                malformed = summary.malformed,
                failed = summary.failed,
                "processed event batch"
            ),
            Ok(_) => {}
            Err(error) => {
                warn!(error = %error, "failed to poll event streams");
                tokio::time::sleep(POLL_FAILURE_BACKOFF).await;
            }
        }
    }

    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("custodia-worker stopped");
    Ok(())
}

async fn connect_pool(config: &WorkerConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.store_timeout)
        .connect_with(config.pg_connect_options()?)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn watch_for_shutdown(shutdown_requested: Arc<AtomicBool>) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        return;
    }

    info!("shutdown requested, finishing in-flight batch");
    shutdown_requested.store(true, Ordering::SeqCst);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
