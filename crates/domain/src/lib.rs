//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access;
mod category;
mod classification;
mod event;
mod inventory;
mod retention;
mod role;

pub use access::{AccessGrant, AccessGrantId, AccessLevel};
pub use category::{CategoryId, DataCategory, SensitivityLevel};
pub use classification::{
    CategoryAssignment, ClassificationDescriptor, category_for_data_type, classified_event_types,
    classify,
};
pub use event::{EventEnvelope, EventMetadata, SOURCE_SERVICE};
pub use inventory::{AccessControlLevel, DataInventoryEntry, InventoryEntryId};
pub use retention::{RetentionClass, RetentionEntryId, RetentionLedgerEntry, RetentionStatus};
pub use role::ViewerRole;
