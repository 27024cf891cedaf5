use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_core::AppResult;
use custodia_domain::{
    AccessGrant, DataCategory, DataInventoryEntry, InventoryEntryId, RetentionEntryId,
    RetentionLedgerEntry,
};

use super::inputs::InventoryListQuery;

/// Record store for categories and canonical inventory entries.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Finds a category by its unique name.
    async fn find_category_by_name(&self, name: &str) -> AppResult<Option<DataCategory>>;

    /// Inserts a category, returning `Conflict` when the name is taken.
    async fn insert_category(&self, category: DataCategory) -> AppResult<DataCategory>;

    /// Lists every category ordered by name.
    async fn list_categories(&self) -> AppResult<Vec<DataCategory>>;

    /// Finds an inventory entry by its `(data_name, storage_location)` key.
    async fn find_entry(
        &self,
        data_name: &str,
        storage_location: &str,
    ) -> AppResult<Option<DataInventoryEntry>>;

    /// Finds inventory entries by identifier. Unknown identifiers are skipped.
    async fn find_entries_by_ids(
        &self,
        ids: &[InventoryEntryId],
    ) -> AppResult<Vec<DataInventoryEntry>>;

    /// Inserts an inventory entry, returning `Conflict` when the
    /// `(data_name, storage_location)` key is taken.
    async fn insert_entry(&self, entry: DataInventoryEntry) -> AppResult<DataInventoryEntry>;

    /// Lists inventory entries matching a query, ordered by name.
    async fn list_entries(&self, query: &InventoryListQuery)
    -> AppResult<Vec<DataInventoryEntry>>;
}

/// Record store for retention ledger entries.
///
/// Bulk operations match every entry with the record id and return the
/// entries they changed.
#[async_trait]
pub trait RetentionRepository: Send + Sync {
    /// Finds the entry for one `(data_inventory_id, record_id)` pair.
    async fn find_entry(
        &self,
        data_inventory_id: InventoryEntryId,
        record_id: &str,
    ) -> AppResult<Option<RetentionLedgerEntry>>;

    /// Inserts an entry, returning `Conflict` when the pair already exists.
    async fn insert_entry(&self, entry: RetentionLedgerEntry) -> AppResult<RetentionLedgerEntry>;

    /// Sets the last access time of one entry.
    async fn touch_entry(&self, id: RetentionEntryId, accessed_at: DateTime<Utc>)
    -> AppResult<()>;

    /// Sets the last access time of every entry for a record.
    async fn refresh_access(
        &self,
        record_id: &str,
        accessed_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>>;

    /// Marks every not-yet-deleted entry for a record as deleted.
    ///
    /// Returns only entries that transitioned in this call.
    async fn mark_deleted(
        &self,
        record_id: &str,
        reason: &str,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>>;

    /// Moves every not-deleted entry for a record into termination retention.
    async fn mark_termination_hold(
        &self,
        record_id: &str,
        held_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>>;

    /// Lists every entry ordered by expiry.
    async fn list_entries(&self) -> AppResult<Vec<RetentionLedgerEntry>>;

    /// Lists the entries about one data subject ordered by expiry.
    async fn list_entries_for_subject(
        &self,
        data_subject_id: &str,
    ) -> AppResult<Vec<RetentionLedgerEntry>>;
}

/// Read-only store for employee data access grants.
#[async_trait]
pub trait AccessGrantRepository: Send + Sync {
    /// Lists active grants held by one employee.
    async fn list_active_grants(&self, employee_id: &str) -> AppResult<Vec<AccessGrant>>;
}
