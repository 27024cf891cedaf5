use custodia_core::{AppError, AppResult};
use custodia_domain::{CategoryId, SensitivityLevel};
use serde::{Deserialize, Serialize};

/// Largest page size accepted by inventory listings.
pub const INVENTORY_LIST_MAX_LIMIT: usize = 1000;

/// Filters and pagination for inventory listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryListQuery {
    /// Only entries in this category.
    pub category_id: Option<CategoryId>,
    /// Only entries with this raw data type.
    pub data_type: Option<String>,
    /// Only entries whose category has this sensitivity.
    pub sensitivity_level: Option<SensitivityLevel>,
    /// Number of entries to skip.
    pub offset: usize,
    /// Maximum number of entries to return.
    pub limit: usize,
}

impl Default for InventoryListQuery {
    fn default() -> Self {
        Self {
            category_id: None,
            data_type: None,
            sensitivity_level: None,
            offset: 0,
            limit: 100,
        }
    }
}

impl InventoryListQuery {
    /// Rejects zero or oversized page sizes.
    pub fn validate(&self) -> AppResult<()> {
        if self.limit == 0 || self.limit > INVENTORY_LIST_MAX_LIMIT {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {INVENTORY_LIST_MAX_LIMIT}, got {}",
                self.limit
            )));
        }

        Ok(())
    }
}
