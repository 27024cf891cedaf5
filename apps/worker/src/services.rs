use std::sync::Arc;

use custodia_application::{
    CacheAsideCoordinator, ComplianceCache, DeduplicationGate, EventConsumer, EventDispatcher,
    InventoryRegistrar, InventoryRepository, RetentionLedger, RetentionRepository,
    subscribed_topics,
};
use custodia_core::{AppError, AppResult};
use custodia_infrastructure::{
    InMemoryComplianceCache, InMemoryComplianceRepository, PostgresInventoryRepository,
    PostgresRetentionRepository, RedisComplianceCache, RedisStreamTransport,
    StreamConsumerSettings,
};
use sqlx::PgPool;

use crate::worker_config::{CacheBackend, StoreBackend, WorkerConfig};

/// Wired ingestion pipeline plus the transport it reads from.
pub struct WorkerServices {
    pub transport: Arc<RedisStreamTransport>,
    pub consumer: EventConsumer,
}

pub async fn build_worker_services(
    pool: Option<PgPool>,
    config: &WorkerConfig,
) -> AppResult<WorkerServices> {
    let redis_client = redis::Client::open(config.redis_url.as_str())
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

    let cache = build_cache(config, &redis_client).await?;
    let (inventory_repository, retention_repository) = build_ledger_store(config, pool)?;
    let transport = Arc::new(
        RedisStreamTransport::connect(
            &redis_client,
            subscribed_topics().map(str::to_owned).collect(),
            StreamConsumerSettings {
                group: config.consumer_group.clone(),
                consumer: config.consumer_name.clone(),
                batch_size: config.consumer_batch_size,
                block: config.consumer_block,
                pending_retry_interval: config.pending_retry_interval,
            },
        )
        .await?,
    );

    let coordinator = CacheAsideCoordinator::new(cache.clone(), config.cache_ttl);
    let dispatcher = EventDispatcher::new(
        InventoryRegistrar::new(inventory_repository, config.policy.default_retention_days),
        RetentionLedger::new(retention_repository),
        DeduplicationGate::new(cache, config.policy.dedup_ttl_seconds),
        coordinator,
    )
    .with_publisher(transport.clone());
    let consumer = EventConsumer::new(transport.clone(), dispatcher);

    Ok(WorkerServices {
        transport,
        consumer,
    })
}

async fn build_cache(
    config: &WorkerConfig,
    redis_client: &redis::Client,
) -> AppResult<Arc<dyn ComplianceCache>> {
    match config.cache_backend {
        CacheBackend::InMemory => {
            let cache: Arc<dyn ComplianceCache> = Arc::new(InMemoryComplianceCache::new());
            Ok(cache)
        }
        CacheBackend::Redis => {
            let connection = redis_client
                .get_connection_manager()
                .await
                .map_err(|error| {
                    AppError::Unavailable(format!("failed to connect to redis: {error}"))
                })?;
            let cache: Arc<dyn ComplianceCache> = Arc::new(RedisComplianceCache::new(
                connection,
                config.cache_key_prefix.as_str(),
                config.cache_timeout,
            ));
            Ok(cache)
        }
    }
}

fn build_ledger_store(
    config: &WorkerConfig,
    pool: Option<PgPool>,
) -> AppResult<(Arc<dyn InventoryRepository>, Arc<dyn RetentionRepository>)> {
    match config.store_backend {
        StoreBackend::InMemory => {
            let repository = Arc::new(InMemoryComplianceRepository::new());
            let inventory: Arc<dyn InventoryRepository> = repository.clone();
            let retention: Arc<dyn RetentionRepository> = repository;
            Ok((inventory, retention))
        }
        StoreBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                AppError::Validation(
                    "a database pool is required when STORE_BACKEND=postgres".to_owned(),
                )
            })?;
            let inventory: Arc<dyn InventoryRepository> =
                Arc::new(PostgresInventoryRepository::new(pool.clone()));
            let retention: Arc<dyn RetentionRepository> =
                Arc::new(PostgresRetentionRepository::new(pool));
            Ok((inventory, retention))
        }
    }
}
