//! Redis-backed compliance cache.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use custodia_application::ComplianceCache;
use custodia_core::{AppError, AppResult};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

const SCAN_BATCH_SIZE: usize = 200;

/// Redis implementation of the compliance cache port.
///
/// Every call is bounded by `timeout`; a slow or unreachable server reads as
/// `Unavailable`.
#[derive(Clone)]
pub struct RedisComplianceCache {
    connection: ConnectionManager,
    key_prefix: String,
    timeout: Duration,
}

impl RedisComplianceCache {
    /// Creates a cache adapter over a managed connection.
    #[must_use]
    pub fn new(
        connection: ConnectionManager,
        key_prefix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            connection,
            key_prefix: key_prefix.into(),
            timeout,
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn bounded<T, F>(&self, operation: &str, future: F) -> AppResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(AppError::Unavailable(format!(
                "redis {operation} failed: {error}"
            ))),
            Err(_) => Err(AppError::Unavailable(format!(
                "redis {operation} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl ComplianceCache for RedisComplianceCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let key = self.key_for(key);
        let mut connection = self.connection.clone();
        let value: Option<String> = self.bounded("GET", connection.get(key)).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let key = self.key_for(key);
        let mut connection = self.connection.clone();
        self.bounded::<(), _>("SETEX", connection.set_ex(key, value, ttl_seconds))
            .await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let key = self.key_for(key);
        let mut connection = self.connection.clone();
        self.bounded::<(), _>("DEL", connection.del(key)).await
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        let pattern = format!("{}*", self.key_for(prefix));
        let mut connection = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = self
                .bounded(
                    "SCAN",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern.as_str())
                        .arg("COUNT")
                        .arg(SCAN_BATCH_SIZE)
                        .query_async(&mut connection),
                )
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = self.bounded("DEL", connection.del(keys)).await?;
                removed += deleted;
            }

            if next_cursor == 0 {
                return Ok(removed);
            }
            cursor = next_cursor;
        }
    }

    async fn increment(&self, key: &str, ttl_seconds: u64) -> AppResult<i64> {
        let key = self.key_for(key);
        let ttl_seconds = i64::try_from(ttl_seconds).map_err(|error| {
            AppError::Validation(format!("invalid counter ttl '{ttl_seconds}': {error}"))
        })?;
        let mut connection = self.connection.clone();

        let (count,): (i64,) = self
            .bounded(
                "INCR",
                redis::pipe()
                    .atomic()
                    .incr(key.as_str(), 1)
                    .expire(key.as_str(), ttl_seconds)
                    .ignore()
                    .query_async(&mut connection),
            )
            .await?;

        Ok(count)
    }
}
