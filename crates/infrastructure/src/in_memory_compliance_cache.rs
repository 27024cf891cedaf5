use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use custodia_application::ComplianceCache;
use custodia_core::{AppError, AppResult};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

fn expiry_after(now: Instant, ttl_seconds: u64) -> Instant {
    now.checked_add(Duration::from_secs(ttl_seconds))
        .unwrap_or(now)
}

/// In-memory cache adapter for tests and single-process runs.
#[derive(Default)]
pub struct InMemoryComplianceCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryComplianceCache {
    /// Creates an empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComplianceCache for InMemoryComplianceCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(Instant::now()) => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| !entry.is_live(Instant::now()))
        {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        self.entries.write().await.insert(
            key.to_owned(),
            CacheEntry {
                value: value.to_owned(),
                expires_at: expiry_after(now, ttl_seconds),
            },
        );

        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));

        Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
    }

    async fn increment(&self, key: &str, ttl_seconds: u64) -> AppResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(entry) if entry.is_live(now) => entry.value.parse::<i64>().map_err(|error| {
                AppError::Validation(format!("cache key '{key}' does not hold a counter: {error}"))
            })?,
            _ => 0,
        };
        let next = current + 1;

        entries.insert(
            key.to_owned(),
            CacheEntry {
                value: next.to_string(),
                expires_at: expiry_after(now, ttl_seconds),
            },
        );

        Ok(next)
    }
}
