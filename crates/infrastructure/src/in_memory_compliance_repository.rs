use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_application::{
    AccessGrantRepository, InventoryListQuery, InventoryRepository, RetentionRepository,
};
use custodia_core::{AppError, AppResult};
use custodia_domain::{
    AccessGrant, CategoryId, DataCategory, DataInventoryEntry, InventoryEntryId,
    RetentionEntryId, RetentionLedgerEntry,
};
use tokio::sync::RwLock;

/// In-memory store for categories, inventory, retention entries and access grants.
///
/// Uniqueness keys match the PostgreSQL schema so conflict recovery behaves the same.
#[derive(Debug, Default)]
pub struct InMemoryComplianceRepository {
    categories: RwLock<HashMap<String, DataCategory>>,
    inventory: RwLock<HashMap<(String, String), DataInventoryEntry>>,
    retention: RwLock<HashMap<(InventoryEntryId, String), RetentionLedgerEntry>>,
    access_grants: RwLock<Vec<AccessGrant>>,
}

impl InMemoryComplianceRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an access grant. Grants are maintained outside the ingestion pipeline.
    pub async fn grant_access(&self, grant: AccessGrant) {
        self.access_grants.write().await.push(grant);
    }

    async fn sensitivity_filter_categories(
        &self,
        query: &InventoryListQuery,
    ) -> Option<Vec<CategoryId>> {
        let sensitivity_level = query.sensitivity_level?;
        Some(
            self.categories
                .read()
                .await
                .values()
                .filter(|category| category.sensitivity_level == sensitivity_level)
                .map(|category| category.id)
                .collect(),
        )
    }

    async fn update_matching<F>(&self, record_id: &str, mut update: F) -> Vec<RetentionLedgerEntry>
    where
        F: FnMut(&mut RetentionLedgerEntry) -> bool,
    {
        let mut retention = self.retention.write().await;
        let mut changed: Vec<RetentionLedgerEntry> = retention
            .values_mut()
            .filter(|entry| entry.record_id == record_id)
            .filter_map(|entry| update(entry).then(|| entry.clone()))
            .collect();
        sort_by_expiry(&mut changed);
        changed
    }
}

fn sort_by_expiry(entries: &mut [RetentionLedgerEntry]) {
    entries.sort_by(|left, right| {
        left.retention_expires_at
            .cmp(&right.retention_expires_at)
            .then_with(|| left.id.as_uuid().cmp(&right.id.as_uuid()))
    });
}

#[async_trait]
impl InventoryRepository for InMemoryComplianceRepository {
    async fn find_category_by_name(&self, name: &str) -> AppResult<Option<DataCategory>> {
        Ok(self.categories.read().await.get(name).cloned())
    }

    async fn insert_category(&self, category: DataCategory) -> AppResult<DataCategory> {
        let mut categories = self.categories.write().await;
        if categories.contains_key(category.name.as_str()) {
            return Err(AppError::Conflict(format!(
                "data category '{}' already exists",
                category.name
            )));
        }

        categories.insert(category.name.clone(), category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> AppResult<Vec<DataCategory>> {
        let mut categories: Vec<DataCategory> =
            self.categories.read().await.values().cloned().collect();
        categories.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(categories)
    }

    async fn find_entry(
        &self,
        data_name: &str,
        storage_location: &str,
    ) -> AppResult<Option<DataInventoryEntry>> {
        Ok(self
            .inventory
            .read()
            .await
            .get(&(data_name.to_owned(), storage_location.to_owned()))
            .cloned())
    }

    async fn find_entries_by_ids(
        &self,
        ids: &[InventoryEntryId],
    ) -> AppResult<Vec<DataInventoryEntry>> {
        Ok(self
            .inventory
            .read()
            .await
            .values()
            .filter(|entry| ids.contains(&entry.id))
            .cloned()
            .collect())
    }

    async fn insert_entry(&self, entry: DataInventoryEntry) -> AppResult<DataInventoryEntry> {
        let key = (entry.data_name.clone(), entry.storage_location.clone());
        let mut inventory = self.inventory.write().await;
        if inventory.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "inventory entry '{}' at '{}' already exists",
                key.0, key.1
            )));
        }

        inventory.insert(key, entry.clone());
        Ok(entry)
    }

    async fn list_entries(
        &self,
        query: &InventoryListQuery,
    ) -> AppResult<Vec<DataInventoryEntry>> {
        let sensitivity_categories = self.sensitivity_filter_categories(query).await;
        let mut entries: Vec<DataInventoryEntry> = self
            .inventory
            .read()
            .await
            .values()
            .filter(|entry| query.category_id.is_none_or(|id| entry.category_id == id))
            .filter(|entry| {
                query
                    .data_type
                    .as_deref()
                    .is_none_or(|data_type| entry.data_type == data_type)
            })
            .filter(|entry| {
                sensitivity_categories
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&entry.category_id))
            })
            .cloned()
            .collect();
        entries.sort_by(|left, right| {
            left.data_name
                .cmp(&right.data_name)
                .then_with(|| left.storage_location.cmp(&right.storage_location))
        });

        Ok(entries
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

#[async_trait]
impl RetentionRepository for InMemoryComplianceRepository {
    async fn find_entry(
        &self,
        data_inventory_id: InventoryEntryId,
        record_id: &str,
    ) -> AppResult<Option<RetentionLedgerEntry>> {
        Ok(self
            .retention
            .read()
            .await
            .get(&(data_inventory_id, record_id.to_owned()))
            .cloned())
    }

    async fn insert_entry(&self, entry: RetentionLedgerEntry) -> AppResult<RetentionLedgerEntry> {
        let key = (entry.data_inventory_id, entry.record_id.clone());
        let mut retention = self.retention.write().await;
        if retention.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "retention entry for record '{}' already exists in inventory entry '{}'",
                key.1, key.0
            )));
        }

        retention.insert(key, entry.clone());
        Ok(entry)
    }

    async fn touch_entry(
        &self,
        id: RetentionEntryId,
        accessed_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut retention = self.retention.write().await;
        let entry = retention
            .values_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| AppError::NotFound(format!("retention entry '{id}' does not exist")))?;
        entry.touch(accessed_at);
        Ok(())
    }

    async fn refresh_access(
        &self,
        record_id: &str,
        accessed_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        Ok(self
            .update_matching(record_id, |entry| {
                entry.touch(accessed_at);
                true
            })
            .await)
    }

    async fn mark_deleted(
        &self,
        record_id: &str,
        reason: &str,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        Ok(self
            .update_matching(record_id, |entry| entry.mark_deleted(reason, deleted_at))
            .await)
    }

    async fn mark_termination_hold(
        &self,
        record_id: &str,
        held_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        Ok(self
            .update_matching(record_id, |entry| entry.hold_for_termination(held_at))
            .await)
    }

    async fn list_entries(&self) -> AppResult<Vec<RetentionLedgerEntry>> {
        let mut entries: Vec<RetentionLedgerEntry> =
            self.retention.read().await.values().cloned().collect();
        sort_by_expiry(&mut entries);
        Ok(entries)
    }

    async fn list_entries_for_subject(
        &self,
        data_subject_id: &str,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        let mut entries: Vec<RetentionLedgerEntry> = self
            .retention
            .read()
            .await
            .values()
            .filter(|entry| entry.data_subject_id.as_deref() == Some(data_subject_id))
            .cloned()
            .collect();
        sort_by_expiry(&mut entries);
        Ok(entries)
    }
}

#[async_trait]
impl AccessGrantRepository for InMemoryComplianceRepository {
    async fn list_active_grants(&self, employee_id: &str) -> AppResult<Vec<AccessGrant>> {
        Ok(self
            .access_grants
            .read()
            .await
            .iter()
            .filter(|grant| grant.employee_id == employee_id && grant.is_active)
            .cloned()
            .collect())
    }
}
