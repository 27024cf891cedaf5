use async_trait::async_trait;
use custodia_core::AppResult;

/// Shared key-value cache used for report payloads, dedup markers and counters.
///
/// Implementations must bound every call in time and report an unreachable
/// backend as `Unavailable`.
#[async_trait]
pub trait ComplianceCache: Send + Sync {
    /// Returns the stored value for a key.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores a value that expires after `ttl_seconds`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()>;

    /// Removes one key.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Removes every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64>;

    /// Increments a counter and refreshes its expiry, returning the new value.
    async fn increment(&self, key: &str, ttl_seconds: u64) -> AppResult<i64>;
}
