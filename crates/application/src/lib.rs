//! Application services and ports.

#![forbid(unsafe_code)]

mod cache_coordinator;
mod compliance_policy;
/// Ports implemented by infrastructure adapters.
pub mod compliance_ports;
mod deduplication_gate;
mod event_consumer;
mod event_dispatcher;
mod inventory_registrar;
mod reporting_service;
mod retention_ledger;
#[cfg(test)]
mod test_support;
mod visibility;

pub use cache_coordinator::{CacheAsideCoordinator, CacheKey};
pub use compliance_policy::{CacheTtlPolicy, CompliancePolicy};
pub use compliance_ports::{
    AccessGrantRepository, ComplianceCache, DeliveredEvent, EventPublisher, EventStream,
    INVENTORY_LIST_MAX_LIMIT, InventoryListQuery, InventoryRepository, RetentionRepository,
};
pub use deduplication_gate::{DeduplicationGate, EventKey};
pub use event_consumer::{BatchSummary, EventConsumer};
pub use event_dispatcher::{DATA_DELETED_TOPIC, EventDispatcher, EventOutcome, subscribed_topics};
pub use inventory_registrar::{InventoryRegistrar, InventoryResolution};
pub use reporting_service::{
    AccessControlItem, AccessControlsReport, ActionItems, CategoryListing, CategorySummary,
    InventoryListing, ReportingService, RetentionItem, RetentionReport, SubjectRetentionPolicy,
    SubjectSummary,
};
pub use retention_ledger::RetentionLedger;
pub use visibility::{
    can_manage_access_controls, can_view_access_controls, can_view_data_inventory,
    can_view_retention_reports, can_view_subject_summary, filter_inventory_for_role,
    filter_retention_items_for_role,
};
