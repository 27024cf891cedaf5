use std::sync::Arc;

use chrono::Utc;
use custodia_core::{AppError, AppResult};
use custodia_domain::{
    AccessControlLevel, CategoryId, ClassificationDescriptor, DataCategory, DataInventoryEntry,
    InventoryEntryId, category_for_data_type,
};
use tracing::{debug, info};

use crate::compliance_ports::InventoryRepository;

const DEFAULT_ENCRYPTION_STATUS: &str = "encrypted";
const DEFAULT_DATA_SUBJECTS: &str = "employees";
const DEFAULT_PROCESSING_SYSTEM: &str = "HRMS";

/// Result of resolving a classification to its canonical inventory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryResolution {
    /// The canonical entry.
    pub entry: DataInventoryEntry,
    /// Whether this call inserted the entry or its category.
    pub created: bool,
}

/// Owns canonical inventory entry identity.
///
/// Creation is insert-then-recover: a uniqueness conflict from the store means
/// a concurrent writer won, and the winner's row is read back.
#[derive(Clone)]
pub struct InventoryRegistrar {
    repository: Arc<dyn InventoryRepository>,
    default_retention_days: u32,
}

impl InventoryRegistrar {
    /// Creates a registrar assigning `default_retention_days` to new entries.
    #[must_use]
    pub fn new(repository: Arc<dyn InventoryRepository>, default_retention_days: u32) -> Self {
        Self {
            repository,
            default_retention_days,
        }
    }

    /// Returns the canonical entry for a classification, creating it on first sight.
    pub async fn resolve_or_create(
        &self,
        descriptor: &ClassificationDescriptor,
    ) -> AppResult<InventoryResolution> {
        if let Some(entry) = self
            .repository
            .find_entry(descriptor.data_name, descriptor.storage_location)
            .await?
        {
            return Ok(InventoryResolution {
                entry,
                created: false,
            });
        }

        let (category, category_created) = self.resolve_category(descriptor.data_type).await?;
        let now = Utc::now();
        let candidate = DataInventoryEntry {
            id: InventoryEntryId::new(),
            data_name: descriptor.data_name.to_owned(),
            description: None,
            data_type: descriptor.data_type.to_owned(),
            category_id: category.id,
            storage_location: descriptor.storage_location.to_owned(),
            purpose_of_processing: descriptor.purpose.to_owned(),
            legal_basis: descriptor.legal_basis.to_owned(),
            retention_days: self.default_retention_days,
            retention_policy: None,
            data_subjects: Some(DEFAULT_DATA_SUBJECTS.to_owned()),
            recipients: None,
            third_party_sharing: false,
            third_party_recipients: None,
            encryption_status: DEFAULT_ENCRYPTION_STATUS.to_owned(),
            access_control_level: AccessControlLevel::Restricted,
            processing_system: Some(DEFAULT_PROCESSING_SYSTEM.to_owned()),
            created_at: now,
            updated_at: now,
        };

        match self.repository.insert_entry(candidate).await {
            Ok(entry) => {
                info!(
                    data_name = %entry.data_name,
                    storage_location = %entry.storage_location,
                    inventory_id = %entry.id,
                    "created data inventory entry"
                );
                Ok(InventoryResolution {
                    entry,
                    created: true,
                })
            }
            Err(error) if error.is_conflict() => {
                debug!(
                    data_name = descriptor.data_name,
                    storage_location = descriptor.storage_location,
                    "inventory entry created concurrently, reading winner"
                );
                let entry = self
                    .repository
                    .find_entry(descriptor.data_name, descriptor.storage_location)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "inventory entry '{}' at '{}' conflicted but cannot be read back",
                            descriptor.data_name, descriptor.storage_location
                        ))
                    })?;
                Ok(InventoryResolution {
                    entry,
                    created: category_created,
                })
            }
            Err(error) => Err(error),
        }
    }

    async fn resolve_category(&self, data_type: &str) -> AppResult<(DataCategory, bool)> {
        let assignment = category_for_data_type(data_type);
        if let Some(category) = self
            .repository
            .find_category_by_name(assignment.name)
            .await?
        {
            return Ok((category, false));
        }

        let candidate = DataCategory {
            id: CategoryId::new(),
            name: assignment.name.to_owned(),
            description: Some(format!("Category for {data_type} data")),
            sensitivity_level: assignment.sensitivity,
            created_at: Utc::now(),
        };

        match self.repository.insert_category(candidate).await {
            Ok(category) => {
                info!(
                    category = %category.name,
                    sensitivity_level = category.sensitivity_level.as_str(),
                    "created data category"
                );
                Ok((category, true))
            }
            Err(error) if error.is_conflict() => {
                let category = self
                    .repository
                    .find_category_by_name(assignment.name)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "category '{}' conflicted but cannot be read back",
                            assignment.name
                        ))
                    })?;
                Ok((category, false))
            }
            Err(error) => Err(error),
        }
    }
}
