//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_compliance_cache;
mod in_memory_compliance_repository;
#[cfg(test)]
mod in_memory_event_publisher;
mod postgres_access_grant_repository;
mod postgres_inventory_repository;
mod postgres_retention_repository;
mod redis_compliance_cache;
mod redis_stream_transport;

pub use in_memory_compliance_cache::InMemoryComplianceCache;
pub use in_memory_compliance_repository::InMemoryComplianceRepository;
pub use postgres_access_grant_repository::PostgresAccessGrantRepository;
pub use postgres_inventory_repository::PostgresInventoryRepository;
pub use postgres_retention_repository::PostgresRetentionRepository;
pub use redis_compliance_cache::RedisComplianceCache;
pub use redis_stream_transport::{ENVELOPE_FIELD, RedisStreamTransport, StreamConsumerSettings};

/// Embedded schema migrations for the compliance ledger.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
