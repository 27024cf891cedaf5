mod cache;
mod inputs;
mod repository;
mod transport;

pub use cache::ComplianceCache;
pub use inputs::{INVENTORY_LIST_MAX_LIMIT, InventoryListQuery};
pub use repository::{AccessGrantRepository, InventoryRepository, RetentionRepository};
pub use transport::{DeliveredEvent, EventPublisher, EventStream};
