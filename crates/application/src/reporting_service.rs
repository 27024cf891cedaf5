use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use custodia_core::AppResult;
use custodia_domain::{DataInventoryEntry, InventoryEntryId, RetentionClass, RetentionLedgerEntry};

use crate::cache_coordinator::{CacheAsideCoordinator, CacheKey};
use crate::compliance_ports::{
    AccessGrantRepository, InventoryListQuery, InventoryRepository, RetentionRepository,
};

mod models;

pub use models::{
    AccessControlItem, AccessControlsReport, ActionItems, CategoryListing, CategorySummary,
    InventoryListing, RetentionItem, RetentionReport, SubjectRetentionPolicy, SubjectSummary,
};

const UNKNOWN_LABEL: &str = "Unknown";

/// Cache-aside read models over the inventory and retention ledger.
///
/// Payloads are cached unfiltered; callers apply role visibility per viewer.
#[derive(Clone)]
pub struct ReportingService {
    inventory: Arc<dyn InventoryRepository>,
    retention: Arc<dyn RetentionRepository>,
    access_grants: Arc<dyn AccessGrantRepository>,
    cache: CacheAsideCoordinator,
    default_threshold_days: u32,
}

impl ReportingService {
    /// Creates a reporting service.
    #[must_use]
    pub fn new(
        inventory: Arc<dyn InventoryRepository>,
        retention: Arc<dyn RetentionRepository>,
        access_grants: Arc<dyn AccessGrantRepository>,
        cache: CacheAsideCoordinator,
        default_threshold_days: u32,
    ) -> Self {
        Self {
            inventory,
            retention,
            access_grants,
            cache,
            default_threshold_days,
        }
    }

    /// Lists inventory entries for a filtered page.
    pub async fn list_inventory(&self, query: InventoryListQuery) -> AppResult<InventoryListing> {
        query.validate()?;
        let key = CacheKey::Inventory(&query);
        if let Some(listing) = self.cache.get(&key).await {
            return Ok(listing);
        }

        let inventory = self.inventory.list_entries(&query).await?;
        let categories = self.inventory.list_categories().await?;
        let listing = InventoryListing {
            count: inventory.len(),
            offset: query.offset,
            limit: query.limit,
            inventory,
            categories,
            generated_at: Utc::now(),
        };

        self.cache.put(&key, &listing).await;
        Ok(listing)
    }

    /// Classifies every ledger entry at the current instant.
    pub async fn get_retention_report(
        &self,
        status: Option<RetentionClass>,
        threshold_days: u32,
    ) -> AppResult<RetentionReport> {
        let key = CacheKey::RetentionReport {
            status,
            threshold_days,
        };
        if let Some(report) = self.cache.get(&key).await {
            return Ok(report);
        }

        let entries = self.retention.list_entries().await?;
        let inventory = self.inventory_for(&entries).await?;
        let now = Utc::now();

        let mut by_class: BTreeMap<RetentionClass, Vec<RetentionItem>> = BTreeMap::new();
        let mut summary_by_category: BTreeMap<String, CategorySummary> = BTreeMap::new();
        let mut marked_for_deletion = 0;
        for entry in &entries {
            let Some(inventory_entry) = inventory.get(&entry.data_inventory_id) else {
                continue;
            };

            let item = retention_item(entry, inventory_entry, now, threshold_days);
            summary_by_category
                .entry(item.category.clone())
                .or_default()
                .record(item.status);
            if item.marked_for_deletion {
                marked_for_deletion += 1;
            }
            by_class.entry(item.status).or_default().push(item);
        }

        let count = |class: RetentionClass| by_class.get(&class).map_or(0, Vec::len);
        let active = count(RetentionClass::Active);
        let expiring_soon = count(RetentionClass::ExpiringSoon);
        let expired = count(RetentionClass::Expired);
        let deleted = count(RetentionClass::Deleted);

        let retention_items = RetentionClass::all()
            .iter()
            .filter(|class| status.is_none_or(|status| status == **class))
            .flat_map(|class| by_class.remove(class).unwrap_or_default())
            .collect();

        let report = RetentionReport {
            total_records_tracked: active + expiring_soon + expired + deleted,
            active,
            expiring_soon,
            expired,
            deleted,
            marked_for_deletion,
            action_items: ActionItems {
                delete_immediately: expired,
                delete_within_threshold: expiring_soon,
                urgent_action_required: expired > 0,
            },
            retention_items,
            summary_by_category,
            threshold_days,
            generated_at: now,
        };

        self.cache.put(&key, &report).await;
        Ok(report)
    }

    /// Summarises what the ledger holds about one data subject.
    pub async fn get_subject_summary(&self, subject_id: &str) -> AppResult<SubjectSummary> {
        let key = CacheKey::SubjectSummary(subject_id);
        if let Some(summary) = self.cache.get(&key).await {
            return Ok(summary);
        }

        let entries = self.retention.list_entries_for_subject(subject_id).await?;
        let inventory = self.inventory_for(&entries).await?;
        let now = Utc::now();

        let mut data_types = BTreeSet::new();
        let mut retention_policies = BTreeMap::new();
        let mut retention_items = Vec::new();
        for entry in &entries {
            let Some(inventory_entry) = inventory.get(&entry.data_inventory_id) else {
                continue;
            };

            data_types.insert(inventory_entry.data_type.clone());
            retention_policies
                .entry(inventory_entry.data_name.clone())
                .or_insert_with(|| SubjectRetentionPolicy {
                    data_type: inventory_entry.data_type.clone(),
                    retention_days: inventory_entry.retention_days,
                    deletion_date: entry.retention_expires_at,
                    storage_location: inventory_entry.storage_location.clone(),
                    purpose: inventory_entry.purpose_of_processing.clone(),
                });
            retention_items.push(retention_item(
                entry,
                inventory_entry,
                now,
                self.default_threshold_days,
            ));
        }

        let summary = SubjectSummary {
            subject_id: subject_id.to_owned(),
            total_data_entries: retention_items.len(),
            data_types: data_types.into_iter().collect(),
            retention_policies,
            retention_items,
            next_scheduled_deletion: entries
                .iter()
                .filter(|entry| !entry.is_deleted())
                .filter(|entry| inventory.contains_key(&entry.data_inventory_id))
                .map(|entry| entry.retention_expires_at)
                .min(),
            generated_at: now,
        };

        self.cache.put(&key, &summary).await;
        Ok(summary)
    }

    /// Lists the effective data access grants of one employee.
    pub async fn get_access_controls(&self, employee_id: &str) -> AppResult<AccessControlsReport> {
        let key = CacheKey::AccessControls(employee_id);
        if let Some(report) = self.cache.get(&key).await {
            return Ok(report);
        }

        let now = Utc::now();
        let grants: Vec<_> = self
            .access_grants
            .list_active_grants(employee_id)
            .await?
            .into_iter()
            .filter(|grant| grant.is_effective_at(now))
            .collect();
        let inventory_ids: Vec<InventoryEntryId> =
            grants.iter().map(|grant| grant.data_inventory_id).collect();
        let inventory = self.inventory_by_id(&inventory_ids).await?;

        let access_controls: Vec<AccessControlItem> = grants
            .into_iter()
            .map(|grant| {
                let inventory_entry = inventory.get(&grant.data_inventory_id);
                AccessControlItem {
                    id: grant.id,
                    data_inventory_id: grant.data_inventory_id,
                    data_name: inventory_entry
                        .map_or_else(|| UNKNOWN_LABEL.to_owned(), |entry| entry.data_name.clone()),
                    data_type: inventory_entry
                        .map_or_else(|| UNKNOWN_LABEL.to_owned(), |entry| entry.data_type.clone()),
                    access_level: grant.access_level,
                    access_reason: grant.access_reason,
                    role_based: grant.role_based,
                    role_name: grant.role_name,
                    granted_by: grant.granted_by,
                    granted_at: grant.granted_at,
                    expires_at: grant.expires_at,
                }
            })
            .collect();

        let role_based_accesses = access_controls
            .iter()
            .filter(|item| item.role_based)
            .count();
        let report = AccessControlsReport {
            employee_id: employee_id.to_owned(),
            total_access_entries: access_controls.len(),
            role_based_accesses,
            direct_accesses: access_controls.len() - role_based_accesses,
            access_controls,
            generated_at: now,
        };

        self.cache.put(&key, &report).await;
        Ok(report)
    }

    /// Lists every data category.
    pub async fn list_categories(&self) -> AppResult<CategoryListing> {
        let key = CacheKey::Categories;
        if let Some(listing) = self.cache.get(&key).await {
            return Ok(listing);
        }

        let categories = self.inventory.list_categories().await?;
        let listing = CategoryListing {
            count: categories.len(),
            categories,
            generated_at: Utc::now(),
        };

        self.cache.put(&key, &listing).await;
        Ok(listing)
    }

    async fn inventory_for(
        &self,
        entries: &[RetentionLedgerEntry],
    ) -> AppResult<HashMap<InventoryEntryId, DataInventoryEntry>> {
        let ids: BTreeSet<InventoryEntryId> =
            entries.iter().map(|entry| entry.data_inventory_id).collect();
        let ids: Vec<InventoryEntryId> = ids.into_iter().collect();
        self.inventory_by_id(&ids).await
    }

    async fn inventory_by_id(
        &self,
        ids: &[InventoryEntryId],
    ) -> AppResult<HashMap<InventoryEntryId, DataInventoryEntry>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(self
            .inventory
            .find_entries_by_ids(ids)
            .await?
            .into_iter()
            .map(|entry| (entry.id, entry))
            .collect())
    }
}

fn retention_item(
    entry: &RetentionLedgerEntry,
    inventory_entry: &DataInventoryEntry,
    now: DateTime<Utc>,
    threshold_days: u32,
) -> RetentionItem {
    RetentionItem {
        id: entry.id,
        data_inventory_id: entry.data_inventory_id,
        data_name: inventory_entry.data_name.clone(),
        record_id: entry.record_id.clone(),
        data_created_at: entry.data_created_at,
        retention_expires_at: entry.retention_expires_at,
        days_until_deletion: entry.days_until_deletion(now),
        data_age_days: entry.data_age_days(now),
        category: inventory_entry.data_type.clone(),
        data_subject: entry.data_subject_id.clone(),
        status: entry.classify_at(now, threshold_days),
        stored_status: entry.retention_status,
        marked_for_deletion: entry.marked_for_deletion,
    }
}
