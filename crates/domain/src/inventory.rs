use std::str::FromStr;

use chrono::{DateTime, Utc};
use custodia_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CategoryId;

/// Unique identifier for a canonical inventory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryEntryId(Uuid);

impl InventoryEntryId {
    /// Creates a new random inventory entry identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an inventory entry identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InventoryEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InventoryEntryId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Who may see an inventory entry in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessControlLevel {
    /// Visible to every authenticated viewer.
    Public,
    /// Visible to every employee.
    Internal,
    /// Visible to HR roles.
    Restricted,
    /// Visible to HR administrators; hidden from HR managers for admin data.
    Confidential,
}

impl AccessControlLevel {
    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Restricted => "restricted",
            Self::Confidential => "confidential",
        }
    }
}

impl FromStr for AccessControlLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "public" => Ok(Self::Public),
            "internal" => Ok(Self::Internal),
            "restricted" => Ok(Self::Restricted),
            "confidential" => Ok(Self::Confidential),
            _ => Err(AppError::Validation(format!(
                "unknown access control level '{value}'"
            ))),
        }
    }
}

/// One canonical kind of personal data processed by the organisation.
///
/// At most one entry exists per `(data_name, storage_location)` pair. Entries
/// are never deleted so the inventory stays auditable after the producing
/// service disappears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInventoryEntry {
    /// Entry identifier.
    pub id: InventoryEntryId,
    /// Display name of the data kind.
    pub data_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Raw classification tag such as `personal` or `sensitive`.
    pub data_type: String,
    /// Owning category.
    pub category_id: CategoryId,
    /// Storage location label, usually `service.table`.
    pub storage_location: String,
    /// Why the data is processed.
    pub purpose_of_processing: String,
    /// Lawful basis for processing.
    pub legal_basis: String,
    /// Retention period applied to ledger entries created from this entry.
    pub retention_days: u32,
    /// Optional free-form retention policy text.
    pub retention_policy: Option<String>,
    /// Who the data is about.
    pub data_subjects: Option<String>,
    /// Internal recipients of the data.
    pub recipients: Option<String>,
    /// Whether the data leaves the organisation.
    pub third_party_sharing: bool,
    /// External recipients, if shared.
    pub third_party_recipients: Option<String>,
    /// Encryption descriptor, `encrypted` by default.
    pub encryption_status: String,
    /// Report visibility level.
    pub access_control_level: AccessControlLevel,
    /// System of record.
    pub processing_system: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
