use std::sync::Arc;

use chrono::{DateTime, Utc};
use custodia_core::{AppError, AppResult};
use custodia_domain::{DataInventoryEntry, RetentionLedgerEntry};
use tracing::debug;

use crate::compliance_ports::RetentionRepository;

/// Owns the lifecycle of per-record retention entries.
#[derive(Clone)]
pub struct RetentionLedger {
    repository: Arc<dyn RetentionRepository>,
}

impl RetentionLedger {
    /// Creates a ledger over a retention store.
    #[must_use]
    pub fn new(repository: Arc<dyn RetentionRepository>) -> Self {
        Self { repository }
    }

    /// Refreshes the entry for `(inventory entry, record)` or opens a new one.
    ///
    /// Expiry is computed from the inventory entry's retention period at
    /// creation and never recomputed afterwards.
    pub async fn upsert(
        &self,
        inventory_entry: &DataInventoryEntry,
        record_id: &str,
        data_subject_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<RetentionLedgerEntry> {
        if let Some(existing) = self.touch_existing(inventory_entry, record_id, now).await? {
            return Ok(existing);
        }

        let candidate = RetentionLedgerEntry::open(
            inventory_entry.id,
            record_id,
            data_subject_id.map(str::to_owned),
            now,
            inventory_entry.retention_days,
        );

        match self.repository.insert_entry(candidate).await {
            Ok(entry) => Ok(entry),
            Err(error) if error.is_conflict() => {
                debug!(record_id, "retention entry created concurrently, refreshing winner");
                self.touch_existing(inventory_entry, record_id, now)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "retention entry for record '{record_id}' conflicted but cannot be read back"
                        ))
                    })
            }
            Err(error) => Err(error),
        }
    }

    /// Updates the last access time of every entry for a record.
    pub async fn refresh_access(
        &self,
        record_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        self.repository.refresh_access(record_id, now).await
    }

    /// Marks every entry for a record deleted. Already deleted entries are left as they are.
    ///
    /// Returns the entries that were newly deleted.
    pub async fn mark_deleted(
        &self,
        record_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        self.repository.mark_deleted(record_id, reason, now).await
    }

    /// Flags every live entry for a record for termination legal-hold review.
    pub async fn mark_termination_hold(
        &self,
        record_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        self.repository.mark_termination_hold(record_id, now).await
    }

    async fn touch_existing(
        &self,
        inventory_entry: &DataInventoryEntry,
        record_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RetentionLedgerEntry>> {
        let Some(mut existing) = self
            .repository
            .find_entry(inventory_entry.id, record_id)
            .await?
        else {
            return Ok(None);
        };

        self.repository.touch_entry(existing.id, now).await?;
        existing.touch(now);
        Ok(Some(existing))
    }
}
