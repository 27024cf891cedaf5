//! Role visibility rules applied to report payloads after cache lookup.
//!
//! Cached payloads are always unfiltered; these functions narrow them per viewer.

use custodia_domain::{AccessControlLevel, DataInventoryEntry, ViewerRole};

use crate::reporting_service::{InventoryListing, RetentionItem, RetentionReport};

const ADMIN_DATA_TYPE: &str = "admin";

/// Returns whether a role may read the processing-activities inventory.
#[must_use]
pub fn can_view_data_inventory(role: ViewerRole) -> bool {
    role.is_hr()
}

/// Returns whether a role may read ledger-wide retention reports.
#[must_use]
pub fn can_view_retention_reports(role: ViewerRole) -> bool {
    role.is_hr()
}

/// Returns whether a role may grant or revoke data access.
#[must_use]
pub fn can_manage_access_controls(role: ViewerRole) -> bool {
    role == ViewerRole::HrAdmin
}

/// Returns whether a viewer may read the data summary of `subject_id`.
///
/// Everyone may read their own.
#[must_use]
pub fn can_view_subject_summary(viewer_id: &str, role: ViewerRole, subject_id: &str) -> bool {
    viewer_id == subject_id || role.is_hr()
}

/// Returns whether a viewer may read the access grants of `employee_id`.
#[must_use]
pub fn can_view_access_controls(viewer_id: &str, role: ViewerRole, employee_id: &str) -> bool {
    viewer_id == employee_id || role.is_hr()
}

/// Narrows inventory entries to what a role may see.
#[must_use]
pub fn filter_inventory_for_role(
    entries: Vec<DataInventoryEntry>,
    role: ViewerRole,
) -> Vec<DataInventoryEntry> {
    match role {
        ViewerRole::HrAdmin => entries,
        ViewerRole::HrManager => entries
            .into_iter()
            .filter(|entry| {
                entry.access_control_level != AccessControlLevel::Confidential
                    || entry.data_type != ADMIN_DATA_TYPE
            })
            .collect(),
        ViewerRole::Manager | ViewerRole::Employee => entries
            .into_iter()
            .filter(|entry| {
                matches!(
                    entry.access_control_level,
                    AccessControlLevel::Public | AccessControlLevel::Internal
                )
            })
            .collect(),
    }
}

/// Narrows retention items to what a viewer may see.
///
/// Non-HR viewers only see records about themselves.
#[must_use]
pub fn filter_retention_items_for_role(
    items: Vec<RetentionItem>,
    viewer_id: &str,
    role: ViewerRole,
) -> Vec<RetentionItem> {
    if role.is_hr() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| item.data_subject.as_deref() == Some(viewer_id))
        .collect()
}

impl InventoryListing {
    /// Returns the listing narrowed to what a role may see.
    #[must_use]
    pub fn visible_to(mut self, role: ViewerRole) -> Self {
        self.inventory = filter_inventory_for_role(self.inventory, role);
        self.count = self.inventory.len();
        self
    }
}

impl RetentionReport {
    /// Returns the report with its item list narrowed to what a viewer may see.
    ///
    /// Aggregate counts are left as computed.
    #[must_use]
    pub fn visible_to(mut self, viewer_id: &str, role: ViewerRole) -> Self {
        self.retention_items = filter_retention_items_for_role(self.retention_items, viewer_id, role);
        self
    }
}
