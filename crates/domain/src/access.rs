use std::str::FromStr;

use chrono::{DateTime, Utc};
use custodia_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::InventoryEntryId;

/// Unique identifier for an access grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessGrantId(Uuid);

impl AccessGrantId {
    /// Creates a new random access grant identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an access grant identifier from an existing UUID value.
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

impl Default for AccessGrantId {
    fn default() -> Self {
        Self::new()
    }
}

/// Access right granted on an inventory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Read access.
    Read,
    /// Write access.
    Write,
    /// Delete access.
    Delete,
    /// Full control.
    Admin,
}

impl AccessLevel {
    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for AccessLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!("unknown access level '{value}'"))),
        }
    }
}

/// Right of one employee to one kind of inventoried data.
///
/// Grants are written by an administrative path; this service only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Grant identifier.
    pub id: AccessGrantId,
    /// Employee holding the grant.
    pub employee_id: String,
    /// Inventory entry the grant applies to.
    pub data_inventory_id: InventoryEntryId,
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
    /// When access lapses, if ever.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the grant is in force.
    pub is_active: bool,
}

impl AccessGrant {
    /// Returns true when the grant is active and not expired at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}
