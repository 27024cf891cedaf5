use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use custodia_domain::{
    AccessGrantId, AccessLevel, DataCategory, DataInventoryEntry, InventoryEntryId,
    RetentionClass, RetentionEntryId, RetentionStatus,
};
use serde::{Deserialize, Serialize};

/// One page of the processing-activities inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryListing {
    /// Number of entries on this page.
    pub count: usize,
    /// Entries skipped before this page.
    pub offset: usize,
    /// Requested page size.
    pub limit: usize,
    /// Inventory entries.
    pub inventory: Vec<DataInventoryEntry>,
    /// Every category, for labelling entries.
    pub categories: Vec<DataCategory>,
    /// When the listing was computed.
    pub generated_at: DateTime<Utc>,
}

/// A ledger entry joined with its inventory entry and classified at report time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionItem {
    /// Ledger entry identifier.
    pub id: RetentionEntryId,
    /// Inventory entry the record belongs to.
    pub data_inventory_id: InventoryEntryId,
    /// Inventory entry display name.
    pub data_name: String,
    /// External record identifier.
    pub record_id: String,
    /// When tracking started.
    pub data_created_at: DateTime<Utc>,
    /// When the record becomes eligible for deletion.
    pub retention_expires_at: DateTime<Utc>,
    /// Whole days until expiry, negative when overdue.
    pub days_until_deletion: i64,
    /// Whole days since tracking started.
    pub data_age_days: i64,
    /// Raw data type of the inventory entry.
    pub category: String,
    /// Person the record is about.
    pub data_subject: Option<String>,
    /// Derived report class.
    pub status: RetentionClass,
    /// Persisted status, including termination retention.
    pub stored_status: RetentionStatus,
    /// Whether deletion was requested.
    pub marked_for_deletion: bool,
}

/// Counts that tell a compliance officer what to do next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItems {
    /// Expired records.
    pub delete_immediately: usize,
    /// Records expiring within the threshold.
    pub delete_within_threshold: usize,
    /// True when anything has expired.
    pub urgent_action_required: bool,
}

/// Per-class counts for one data type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    /// All classified records.
    pub total: usize,
    /// Active records.
    pub active: usize,
    /// Records expiring within the threshold.
    pub expiring_soon: usize,
    /// Expired records.
    pub expired: usize,
    /// Deleted records.
    pub deleted: usize,
}

impl CategorySummary {
    pub(crate) fn record(&mut self, class: RetentionClass) {
        self.total += 1;
        match class {
            RetentionClass::Active => self.active += 1,
            RetentionClass::ExpiringSoon => self.expiring_soon += 1,
            RetentionClass::Expired => self.expired += 1,
            RetentionClass::Deleted => self.deleted += 1,
        }
    }
}

/// Storage-limitation report over the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionReport {
    /// Classified records. Entries without an inventory entry are excluded.
    pub total_records_tracked: usize,
    /// Active records.
    pub active: usize,
    /// Records expiring within the threshold.
    pub expiring_soon: usize,
    /// Expired records.
    pub expired: usize,
    /// Deleted records.
    pub deleted: usize,
    /// Records flagged for deletion.
    pub marked_for_deletion: usize,
    /// Derived action counts.
    pub action_items: ActionItems,
    /// Items matching the status filter.
    pub retention_items: Vec<RetentionItem>,
    /// Counts keyed by data type, over every classified record.
    pub summary_by_category: BTreeMap<String, CategorySummary>,
    /// Expiring-soon threshold used.
    pub threshold_days: u32,
    /// When the report was computed.
    pub generated_at: DateTime<Utc>,
}

/// Retention policy of one kind of data held about a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRetentionPolicy {
    /// Raw data type.
    pub data_type: String,
    /// Retention period of the inventory entry.
    pub retention_days: u32,
    /// Expiry of the earliest record of this kind.
    pub deletion_date: DateTime<Utc>,
    /// Storage location label.
    pub storage_location: String,
    /// Processing purpose.
    pub purpose: String,
}

/// Everything the ledger holds about one data subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
    /// Data subject identifier.
    pub subject_id: String,
    /// Ledger entries about the subject.
    pub total_data_entries: usize,
    /// Distinct data types held.
    pub data_types: Vec<String>,
    /// Policies keyed by inventory entry name.
    pub retention_policies: BTreeMap<String, SubjectRetentionPolicy>,
    /// Classified ledger entries about the subject.
    pub retention_items: Vec<RetentionItem>,
    /// Earliest expiry among entries not yet deleted.
    pub next_scheduled_deletion: Option<DateTime<Utc>>,
    /// When the summary was computed.
    pub generated_at: DateTime<Utc>,
}

/// One grant joined with the inventory entry it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlItem {
    /// Grant identifier.
    pub id: AccessGrantId,
    /// Inventory entry covered.
    pub data_inventory_id: InventoryEntryId,
    /// Inventory entry name, `Unknown` when missing.
    pub data_name: String,
    /// Inventory data type, `Unknown` when missing.
    pub data_type: String,
    /// Granted level.
    pub access_level: AccessLevel,
    /// Why access was granted.
    pub access_reason: String,
    /// Whether the grant derives from a role.
    pub role_based: bool,
    /// Role the grant derives from.
    pub role_name: Option<String>,
    /// Who granted access.
    pub granted_by: Option<String>,
    /// When access was granted.
    pub granted_at: DateTime<Utc>,
    /// When access lapses.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Active data access held by one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlsReport {
    /// Employee identifier.
    pub employee_id: String,
    /// Number of effective grants.
    pub total_access_entries: usize,
    /// Grants derived from roles.
    pub role_based_accesses: usize,
    /// Grants made directly.
    pub direct_accesses: usize,
    /// Grant details.
    pub access_controls: Vec<AccessControlItem>,
    /// When the report was computed.
    pub generated_at: DateTime<Utc>,
}

/// All data categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryListing {
    /// Number of categories.
    pub count: usize,
    /// Categories ordered by name.
    pub categories: Vec<DataCategory>,
    /// When the listing was computed.
    pub generated_at: DateTime<Utc>,
}
