use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_core::{AppError, AppResult};
use custodia_domain::{
    AccessGrant, DataCategory, DataInventoryEntry, EventEnvelope, InventoryEntryId,
    RetentionEntryId, RetentionLedgerEntry,
};
use tokio::sync::{Barrier, Mutex};

use crate::compliance_ports::{
    AccessGrantRepository, ComplianceCache, DeliveredEvent, EventPublisher, EventStream,
    InventoryListQuery, InventoryRepository, RetentionRepository,
};

fn unavailable(what: &str) -> AppError {
    AppError::Unavailable(format!("{what} is offline"))
}

#[derive(Default)]
pub(crate) struct FakeInventoryRepository {
    pub(crate) categories: Mutex<Vec<DataCategory>>,
    pub(crate) entries: Mutex<Vec<DataInventoryEntry>>,
    lookup_gate: Option<Arc<Barrier>>,
    gated_lookups: AtomicUsize,
    gate_parties: usize,
}

impl FakeInventoryRepository {
    /// Holds the first `parties` entry lookups until all of them have started.
    pub(crate) fn with_lookup_gate(parties: usize) -> Self {
        Self {
            lookup_gate: Some(Arc::new(Barrier::new(parties))),
            gate_parties: parties,
            ..Self::default()
        }
    }
}

#[async_trait]
impl InventoryRepository for FakeInventoryRepository {
    async fn find_category_by_name(&self, name: &str) -> AppResult<Option<DataCategory>> {
        Ok(self
            .categories
            .lock()
            .await
            .iter()
            .find(|category| category.name == name)
            .cloned())
    }

    async fn insert_category(&self, category: DataCategory) -> AppResult<DataCategory> {
        let mut categories = self.categories.lock().await;
        if categories.iter().any(|stored| stored.name == category.name) {
            return Err(AppError::Conflict(format!(
                "category '{}' already exists",
                category.name
            )));
        }

        categories.push(category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> AppResult<Vec<DataCategory>> {
        let mut categories = self.categories.lock().await.clone();
        categories.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(categories)
    }

    async fn find_entry(
        &self,
        data_name: &str,
        storage_location: &str,
    ) -> AppResult<Option<DataInventoryEntry>> {
        let found = self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| {
                entry.data_name == data_name && entry.storage_location == storage_location
            })
            .cloned();

        // Gated callers all observe the pre-insert state.
        if let Some(gate) = &self.lookup_gate
            && self.gated_lookups.fetch_add(1, Ordering::SeqCst) < self.gate_parties
        {
            gate.wait().await;
        }

        Ok(found)
    }

    async fn find_entries_by_ids(
        &self,
        ids: &[InventoryEntryId],
    ) -> AppResult<Vec<DataInventoryEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| ids.contains(&entry.id))
            .cloned()
            .collect())
    }

    async fn insert_entry(&self, entry: DataInventoryEntry) -> AppResult<DataInventoryEntry> {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|stored| {
            stored.data_name == entry.data_name && stored.storage_location == entry.storage_location
        }) {
            return Err(AppError::Conflict(format!(
                "inventory entry '{}' already exists",
                entry.data_name
            )));
        }

        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_entries(
        &self,
        query: &InventoryListQuery,
    ) -> AppResult<Vec<DataInventoryEntry>> {
        let categories = self.categories.lock().await.clone();
        let mut entries: Vec<DataInventoryEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| query.category_id.is_none_or(|id| entry.category_id == id))
            .filter(|entry| {
                query
                    .data_type
                    .as_deref()
                    .is_none_or(|data_type| entry.data_type == data_type)
            })
            .filter(|entry| {
                query.sensitivity_level.is_none_or(|level| {
                    categories.iter().any(|category| {
                        category.id == entry.category_id && category.sensitivity_level == level
                    })
                })
            })
            .cloned()
            .collect();
        entries.sort_by(|left, right| left.data_name.cmp(&right.data_name));

        Ok(entries
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeRetentionRepository {
    pub(crate) entries: Mutex<Vec<RetentionLedgerEntry>>,
    pub(crate) offline: AtomicBool,
    lookup_gate: Option<Arc<Barrier>>,
    gated_lookups: AtomicUsize,
    gate_parties: usize,
}

impl FakeRetentionRepository {
    /// Holds the first `parties` entry lookups until all of them have started.
    pub(crate) fn with_lookup_gate(parties: usize) -> Self {
        Self {
            lookup_gate: Some(Arc::new(Barrier::new(parties))),
            gate_parties: parties,
            ..Self::default()
        }
    }

    fn ensure_online(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(unavailable("retention store"));
        }

        Ok(())
    }

    pub(crate) async fn snapshot(&self) -> Vec<RetentionLedgerEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl RetentionRepository for FakeRetentionRepository {
    async fn find_entry(
        &self,
        data_inventory_id: InventoryEntryId,
        record_id: &str,
    ) -> AppResult<Option<RetentionLedgerEntry>> {
        self.ensure_online()?;
        let found = self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| {
                entry.data_inventory_id == data_inventory_id && entry.record_id == record_id
            })
            .cloned();

        if let Some(gate) = &self.lookup_gate
            && self.gated_lookups.fetch_add(1, Ordering::SeqCst) < self.gate_parties
        {
            gate.wait().await;
        }

        Ok(found)
    }

    async fn insert_entry(&self, entry: RetentionLedgerEntry) -> AppResult<RetentionLedgerEntry> {
        self.ensure_online()?;
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|stored| {
            stored.data_inventory_id == entry.data_inventory_id
                && stored.record_id == entry.record_id
        }) {
            return Err(AppError::Conflict(format!(
                "retention entry for record '{}' already exists",
                entry.record_id
            )));
        }

        entries.push(entry.clone());
        Ok(entry)
    }

    async fn touch_entry(
        &self,
        id: RetentionEntryId,
        accessed_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.ensure_online()?;
        if let Some(entry) = self
            .entries
            .lock()
            .await
            .iter_mut()
            .find(|entry| entry.id == id)
        {
            entry.touch(accessed_at);
        }

        Ok(())
    }

    async fn refresh_access(
        &self,
        record_id: &str,
        accessed_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        self.ensure_online()?;
        let mut touched = Vec::new();
        for entry in self.entries.lock().await.iter_mut() {
            if entry.record_id == record_id {
                entry.touch(accessed_at);
                touched.push(entry.clone());
            }
        }

        Ok(touched)
    }

    async fn mark_deleted(
        &self,
        record_id: &str,
        reason: &str,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        self.ensure_online()?;
        let mut deleted = Vec::new();
        for entry in self.entries.lock().await.iter_mut() {
            if entry.record_id == record_id && entry.mark_deleted(reason, deleted_at) {
                deleted.push(entry.clone());
            }
        }

        Ok(deleted)
    }

    async fn mark_termination_hold(
        &self,
        record_id: &str,
        held_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        self.ensure_online()?;
        let mut held = Vec::new();
        for entry in self.entries.lock().await.iter_mut() {
            if entry.record_id == record_id && entry.hold_for_termination(held_at) {
                held.push(entry.clone());
            }
        }

        Ok(held)
    }

    async fn list_entries(&self) -> AppResult<Vec<RetentionLedgerEntry>> {
        self.ensure_online()?;
        let mut entries = self.entries.lock().await.clone();
        entries.sort_by_key(|entry| entry.retention_expires_at);
        Ok(entries)
    }

    async fn list_entries_for_subject(
        &self,
        data_subject_id: &str,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        let entries = self.list_entries().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.data_subject_id.as_deref() == Some(data_subject_id))
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeAccessGrantRepository {
    pub(crate) grants: Vec<AccessGrant>,
}

#[async_trait]
impl AccessGrantRepository for FakeAccessGrantRepository {
    async fn list_active_grants(&self, employee_id: &str) -> AppResult<Vec<AccessGrant>> {
        Ok(self
            .grants
            .iter()
            .filter(|grant| grant.employee_id == employee_id && grant.is_active)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeCache {
    pub(crate) values: Mutex<HashMap<String, String>>,
    pub(crate) offline: AtomicBool,
}

impl FakeCache {
    fn ensure_online(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(unavailable("cache"));
        }

        Ok(())
    }

    pub(crate) async fn contains(&self, key: &str) -> bool {
        self.values.lock().await.contains_key(key)
    }

    pub(crate) async fn keys_with_prefix(&self, prefix: &str) -> usize {
        self.values
            .lock()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl ComplianceCache for FakeCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.ensure_online()?;
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, _ttl_seconds: u64) -> AppResult<()> {
        self.ensure_online()?;
        self.values
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.ensure_online()?;
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        self.ensure_online()?;
        let mut values = self.values.lock().await;
        let before = values.len();
        values.retain(|key, _| !key.starts_with(prefix));
        Ok(u64::try_from(before - values.len()).unwrap_or(u64::MAX))
    }

    async fn increment(&self, key: &str, _ttl_seconds: u64) -> AppResult<i64> {
        self.ensure_online()?;
        let mut values = self.values.lock().await;
        let next = values
            .get(key)
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0)
            + 1;
        values.insert(key.to_owned(), next.to_string());
        Ok(next)
    }
}

#[derive(Default)]
pub(crate) struct FakePublisher {
    pub(crate) published: Mutex<Vec<(String, EventEnvelope)>>,
    pub(crate) offline: AtomicBool,
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(unavailable("publisher"));
        }

        self.published
            .lock()
            .await
            .push((topic.to_owned(), envelope.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeEventStream {
    pub(crate) batches: Mutex<VecDeque<Vec<DeliveredEvent>>>,
    pub(crate) acknowledged: Mutex<Vec<String>>,
}

impl FakeEventStream {
    pub(crate) fn with_batch(batch: Vec<DeliveredEvent>) -> Self {
        Self {
            batches: Mutex::new(VecDeque::from([batch])),
            acknowledged: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EventStream for FakeEventStream {
    async fn poll(&self) -> AppResult<Vec<DeliveredEvent>> {
        Ok(self.batches.lock().await.pop_front().unwrap_or_default())
    }

    async fn acknowledge(&self, event: &DeliveredEvent) -> AppResult<()> {
        self.acknowledged
            .lock()
            .await
            .push(event.delivery_id.clone());
        Ok(())
    }
}
