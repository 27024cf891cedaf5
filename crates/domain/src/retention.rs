//! Retention ledger entries and read-time status derivation.

use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use custodia_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::InventoryEntryId;

const SECONDS_PER_DAY: i64 = 86_400;

/// Unique identifier for a retention ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RetentionEntryId(Uuid);

impl RetentionEntryId {
    /// Creates a new random retention entry identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a retention entry identifier from an existing UUID value.
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

impl Default for RetentionEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RetentionEntryId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Status value persisted on a ledger entry.
///
/// Only `Deleted` and `TerminationRetention` are written by the ledger.
/// `ExpiringSoon` and `Expired` may be persisted by an external scheduled
/// job; reports never trust them over [`RetentionLedgerEntry::classify_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionStatus {
    /// Freshly tracked record.
    Active,
    /// Persisted by an external job ahead of expiry.
    ExpiringSoon,
    /// Persisted by an external job after expiry.
    Expired,
    /// Deletion completed. Sticky.
    Deleted,
    /// Employment ended; flagged for legal-hold review. Expiry unchanged.
    TerminationRetention,
}

impl RetentionStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
            Self::TerminationRetention => "termination_retention",
        }
    }
}

impl FromStr for RetentionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "expiring_soon" => Ok(Self::ExpiringSoon),
            "expired" => Ok(Self::Expired),
            "deleted" => Ok(Self::Deleted),
            "termination_retention" => Ok(Self::TerminationRetention),
            _ => Err(AppError::Validation(format!(
                "unknown retention status '{value}'"
            ))),
        }
    }
}

/// Reporting class derived from timestamps at one instant.
///
/// Exactly one class applies to any entry at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionClass {
    /// Expiry is beyond the threshold.
    Active,
    /// Expiry falls within the threshold, boundary inclusive.
    ExpiringSoon,
    /// Expiry has passed.
    Expired,
    /// Deletion completed.
    Deleted,
}

impl RetentionClass {
    /// Returns a stable transport value for this class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        }
    }

    /// Returns all classes in report order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[RetentionClass] = &[
            RetentionClass::Active,
            RetentionClass::ExpiringSoon,
            RetentionClass::Expired,
            RetentionClass::Deleted,
        ];

        ALL
    }
}

impl FromStr for RetentionClass {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "expiring_soon" => Ok(Self::ExpiringSoon),
            "expired" => Ok(Self::Expired),
            "deleted" => Ok(Self::Deleted),
            _ => Err(AppError::Validation(format!(
                "unknown retention status filter '{value}'"
            ))),
        }
    }
}

/// Lifecycle of one physical data record for deletion scheduling.
///
/// At most one entry exists per `(data_inventory_id, record_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionLedgerEntry {
    /// Entry identifier.
    pub id: RetentionEntryId,
    /// Inventory entry describing the kind of data.
    pub data_inventory_id: InventoryEntryId,
    /// Identifier of the external record.
    pub record_id: String,
    /// Person the record is about.
    pub data_subject_id: Option<String>,
    /// When tracking started.
    pub data_created_at: DateTime<Utc>,
    /// Last time an event touched the record.
    pub data_last_accessed_at: DateTime<Utc>,
    /// Computed once at creation; never recomputed.
    pub retention_expires_at: DateTime<Utc>,
    /// Persisted status.
    pub retention_status: RetentionStatus,
    /// Whether deletion was requested.
    pub marked_for_deletion: bool,
    /// When deletion was requested.
    pub marked_for_deletion_at: Option<DateTime<Utc>>,
    /// When deletion completed.
    pub deletion_completed_at: Option<DateTime<Utc>>,
    /// Why the record was deleted.
    pub deletion_reason: Option<String>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl RetentionLedgerEntry {
    /// Opens a new active entry expiring `retention_days` after `created_at`.
    #[must_use]
    pub fn open(
        data_inventory_id: InventoryEntryId,
        record_id: impl Into<String>,
        data_subject_id: Option<String>,
        created_at: DateTime<Utc>,
        retention_days: u32,
    ) -> Self {
        let retention_expires_at = created_at
            .checked_add_signed(TimeDelta::days(i64::from(retention_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            id: RetentionEntryId::new(),
            data_inventory_id,
            record_id: record_id.into(),
            data_subject_id,
            data_created_at: created_at,
            data_last_accessed_at: created_at,
            retention_expires_at,
            retention_status: RetentionStatus::Active,
            marked_for_deletion: false,
            marked_for_deletion_at: None,
            deletion_completed_at: None,
            deletion_reason: None,
            updated_at: created_at,
        }
    }

    /// Returns true once deletion has completed.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deletion_completed_at.is_some()
    }

    /// Records an access without touching the expiry.
    pub fn touch(&mut self, accessed_at: DateTime<Utc>) {
        self.data_last_accessed_at = accessed_at;
        self.updated_at = accessed_at;
    }

    /// Marks the entry deleted. Returns false when it already was.
    pub fn mark_deleted(&mut self, reason: &str, deleted_at: DateTime<Utc>) -> bool {
        if self.is_deleted() {
            return false;
        }

        self.retention_status = RetentionStatus::Deleted;
        self.marked_for_deletion = true;
        self.marked_for_deletion_at = Some(deleted_at);
        self.deletion_completed_at = Some(deleted_at);
        self.deletion_reason = Some(reason.to_owned());
        self.updated_at = deleted_at;
        true
    }

    /// Flags the entry for termination legal-hold review.
    ///
    /// Deleted entries are left untouched. Returns true when the entry changed.
    pub fn hold_for_termination(&mut self, held_at: DateTime<Utc>) -> bool {
        if self.is_deleted() || self.retention_status == RetentionStatus::TerminationRetention {
            return false;
        }

        self.retention_status = RetentionStatus::TerminationRetention;
        self.updated_at = held_at;
        true
    }

    /// Derives the reporting class at `now` for a threshold in days.
    #[must_use]
    pub fn classify_at(&self, now: DateTime<Utc>, threshold_days: u32) -> RetentionClass {
        if self.is_deleted() {
            return RetentionClass::Deleted;
        }

        if self.retention_status == RetentionStatus::Expired || now > self.retention_expires_at {
            return RetentionClass::Expired;
        }

        let within_threshold = now
            .checked_add_signed(TimeDelta::days(i64::from(threshold_days)))
            .is_none_or(|threshold| self.retention_expires_at <= threshold);
        if within_threshold {
            RetentionClass::ExpiringSoon
        } else {
            RetentionClass::Active
        }
    }

    /// Whole days until expiry, negative once overdue.
    #[must_use]
    pub fn days_until_deletion(&self, now: DateTime<Utc>) -> i64 {
        whole_days(self.retention_expires_at - now)
    }

    /// Whole days since tracking started.
    #[must_use]
    pub fn data_age_days(&self, now: DateTime<Utc>) -> i64 {
        whole_days(now - self.data_created_at)
    }
}

// Floors toward negative infinity so a record overdue by half a day reports -1.
fn whole_days(delta: TimeDelta) -> i64 {
    delta.num_seconds().div_euclid(SECONDS_PER_DAY)
}
