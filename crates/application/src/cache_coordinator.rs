use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use custodia_domain::RetentionClass;

use crate::compliance_ports::{ComplianceCache, InventoryListQuery};
use crate::compliance_policy::CacheTtlPolicy;

const INVENTORY_PREFIX: &str = "inventory:";
const RETENTION_PREFIX: &str = "retention:";
const CATEGORIES_KEY: &str = "categories";

/// Cached read model identified by its query parameters.
#[derive(Debug, Clone, Copy)]
pub enum CacheKey<'a> {
    /// Filtered, paginated inventory listing.
    Inventory(&'a InventoryListQuery),
    /// Retention report for an optional class filter and threshold.
    RetentionReport {
        /// Class filter.
        status: Option<RetentionClass>,
        /// Expiring-soon threshold in days.
        threshold_days: u32,
    },
    /// Per-subject retention summary.
    SubjectSummary(&'a str),
    /// Access grants held by one employee.
    AccessControls(&'a str),
    /// Category listing.
    Categories,
}

impl CacheKey<'_> {
    /// Returns the deterministic cache key for these parameters.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Inventory(query) => format!(
                "{INVENTORY_PREFIX}{}:{}:{}:{}:{}",
                query
                    .category_id
                    .map_or_else(|| "all".to_owned(), |id| id.to_string()),
                query.data_type.as_deref().unwrap_or("all"),
                query
                    .sensitivity_level
                    .map_or("all", |level| level.as_str()),
                query.offset,
                query.limit
            ),
            Self::RetentionReport {
                status,
                threshold_days,
            } => format!(
                "{RETENTION_PREFIX}{}:{threshold_days}",
                status.map_or("all", |status| status.as_str())
            ),
            Self::SubjectSummary(subject_id) => format!("employee_data:{subject_id}"),
            Self::AccessControls(employee_id) => format!("access_controls:{employee_id}"),
            Self::Categories => CATEGORIES_KEY.to_owned(),
        }
    }

    fn ttl_seconds(&self, policy: &CacheTtlPolicy) -> u64 {
        match self {
            Self::Inventory(_) => policy.inventory_seconds,
            Self::RetentionReport { .. } => policy.retention_seconds,
            Self::SubjectSummary(_) => policy.subject_seconds,
            Self::AccessControls(_) => policy.access_controls_seconds,
            Self::Categories => policy.categories_seconds,
        }
    }
}

/// Read-through cache for report payloads with coarse write-path invalidation.
///
/// The cache is advisory: every failure degrades to a miss or a skipped write.
#[derive(Clone)]
pub struct CacheAsideCoordinator {
    cache: Arc<dyn ComplianceCache>,
    ttl_policy: CacheTtlPolicy,
}

impl CacheAsideCoordinator {
    /// Creates a coordinator over a cache backend.
    #[must_use]
    pub fn new(cache: Arc<dyn ComplianceCache>, ttl_policy: CacheTtlPolicy) -> Self {
        Self { cache, ttl_policy }
    }

    /// Returns the cached payload for a key, or `None` on miss or failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey<'_>) -> Option<T> {
        let rendered = key.render();
        let raw = match self.cache.get(rendered.as_str()).await {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(key = %rendered, error = %error, "cache read failed, computing from store");
                return None;
            }
        };

        match serde_json::from_str(raw.as_str()) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(key = %rendered, error = %error, "discarding undecodable cache payload");
                None
            }
        }
    }

    /// Stores a payload under a key with its class TTL.
    pub async fn put<T: Serialize>(&self, key: &CacheKey<'_>, value: &T) {
        let rendered = key.render();
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(key = %rendered, error = %error, "failed to encode cache payload");
                return;
            }
        };

        if let Err(error) = self
            .cache
            .set_with_ttl(
                rendered.as_str(),
                encoded.as_str(),
                key.ttl_seconds(&self.ttl_policy),
            )
            .await
        {
            warn!(key = %rendered, error = %error, "cache write failed");
        }
    }

    /// Drops every inventory listing and the category listing.
    pub async fn invalidate_inventory(&self) {
        self.delete_prefix(INVENTORY_PREFIX).await;
        self.delete_key(CATEGORIES_KEY).await;
    }

    /// Drops every retention report and the summaries of the given subjects.
    pub async fn invalidate_retention<'a, I>(&self, subject_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.delete_prefix(RETENTION_PREFIX).await;
        for subject_id in subject_ids {
            self.delete_key(CacheKey::SubjectSummary(subject_id).render().as_str())
                .await;
        }
    }

    /// Bumps the daily counter `counter:<name>:<day>`.
    pub async fn increment_counter(&self, name: &str, day: NaiveDate) {
        let key = format!("counter:{name}:{}", day.format("%Y-%m-%d"));
        if let Err(error) = self
            .cache
            .increment(key.as_str(), self.ttl_policy.counter_seconds)
            .await
        {
            debug!(counter = name, error = %error, "counter increment skipped");
        }
    }

    async fn delete_prefix(&self, prefix: &str) {
        match self.cache.delete_prefix(prefix).await {
            Ok(removed) => debug!(prefix, removed, "invalidated cached reports"),
            Err(error) => warn!(prefix, error = %error, "cache invalidation failed"),
        }
    }

    async fn delete_key(&self, key: &str) {
        if let Err(error) = self.cache.delete(key).await {
            warn!(key, error = %error, "cache invalidation failed");
        }
    }
}
