use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_application::RetentionRepository;
use custodia_core::{AppError, AppResult};
use custodia_domain::{InventoryEntryId, RetentionEntryId, RetentionLedgerEntry, RetentionStatus};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::postgres_inventory_repository::is_unique_violation;

const RETENTION_COLUMNS: &str = "id, data_inventory_id, record_id, data_subject_id, \
    data_created_at, data_last_accessed_at, retention_expires_at, retention_status, \
    marked_for_deletion, marked_for_deletion_at, deletion_completed_at, deletion_reason, \
    updated_at";

/// PostgreSQL-backed retention ledger repository.
#[derive(Clone)]
pub struct PostgresRetentionRepository {
    pool: PgPool,
}

impl PostgresRetentionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RetentionEntryRow {
    id: Uuid,
    data_inventory_id: Uuid,
    record_id: String,
    data_subject_id: Option<String>,
    data_created_at: DateTime<Utc>,
    data_last_accessed_at: DateTime<Utc>,
    retention_expires_at: DateTime<Utc>,
    retention_status: String,
    marked_for_deletion: bool,
    marked_for_deletion_at: Option<DateTime<Utc>>,
    deletion_completed_at: Option<DateTime<Utc>>,
    deletion_reason: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RetentionEntryRow> for RetentionLedgerEntry {
    type Error = AppError;

    fn try_from(row: RetentionEntryRow) -> AppResult<Self> {
        Ok(Self {
            id: RetentionEntryId::from_uuid(row.id),
            data_inventory_id: InventoryEntryId::from_uuid(row.data_inventory_id),
            record_id: row.record_id,
            data_subject_id: row.data_subject_id,
            data_created_at: row.data_created_at,
            data_last_accessed_at: row.data_last_accessed_at,
            retention_expires_at: row.retention_expires_at,
            retention_status: RetentionStatus::from_str(row.retention_status.as_str())?,
            marked_for_deletion: row.marked_for_deletion,
            marked_for_deletion_at: row.marked_for_deletion_at,
            deletion_completed_at: row.deletion_completed_at,
            deletion_reason: row.deletion_reason,
            updated_at: row.updated_at,
        })
    }
}

fn entries_from_rows(rows: Vec<RetentionEntryRow>) -> AppResult<Vec<RetentionLedgerEntry>> {
    rows.into_iter().map(RetentionLedgerEntry::try_from).collect()
}

#[async_trait]
impl RetentionRepository for PostgresRetentionRepository {
    async fn find_entry(
        &self,
        data_inventory_id: InventoryEntryId,
        record_id: &str,
    ) -> AppResult<Option<RetentionLedgerEntry>> {
        let sql = format!(
            "SELECT {RETENTION_COLUMNS} FROM data_retention_entries \
             WHERE data_inventory_id = $1 AND record_id = $2"
        );
        let row = sqlx::query_as::<_, RetentionEntryRow>(sql.as_str())
            .bind(data_inventory_id.as_uuid())
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to find retention entry for record '{record_id}': {error}"
                ))
            })?;

        row.map(RetentionLedgerEntry::try_from).transpose()
    }

    async fn insert_entry(&self, entry: RetentionLedgerEntry) -> AppResult<RetentionLedgerEntry> {
        let result = sqlx::query(
            r#"
            INSERT INTO data_retention_entries (
                id,
                data_inventory_id,
                record_id,
                data_subject_id,
                data_created_at,
                data_last_accessed_at,
                retention_expires_at,
                retention_status,
                marked_for_deletion,
                marked_for_deletion_at,
                deletion_completed_at,
                deletion_reason,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.data_inventory_id.as_uuid())
        .bind(entry.record_id.as_str())
        .bind(entry.data_subject_id.as_deref())
        .bind(entry.data_created_at)
        .bind(entry.data_last_accessed_at)
        .bind(entry.retention_expires_at)
        .bind(entry.retention_status.as_str())
        .bind(entry.marked_for_deletion)
        .bind(entry.marked_for_deletion_at)
        .bind(entry.deletion_completed_at)
        .bind(entry.deletion_reason.as_deref())
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(entry),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
                "retention entry for record '{}' already exists in inventory entry '{}'",
                entry.record_id, entry.data_inventory_id
            ))),
            Err(error) => Err(AppError::Internal(format!(
                "failed to insert retention entry for record '{}': {error}",
                entry.record_id
            ))),
        }
    }

    async fn touch_entry(
        &self,
        id: RetentionEntryId,
        accessed_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE data_retention_entries
            SET data_last_accessed_at = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(accessed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to touch retention entry '{id}': {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "retention entry '{id}' does not exist"
            )));
        }

        Ok(())
    }

    async fn refresh_access(
        &self,
        record_id: &str,
        accessed_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        let sql = format!(
            "UPDATE data_retention_entries \
             SET data_last_accessed_at = $2, updated_at = $2 \
             WHERE record_id = $1 \
             RETURNING {RETENTION_COLUMNS}"
        );
        let rows = sqlx::query_as::<_, RetentionEntryRow>(sql.as_str())
            .bind(record_id)
            .bind(accessed_at)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to refresh retention entries for record '{record_id}': {error}"
                ))
            })?;

        entries_from_rows(rows)
    }

    async fn mark_deleted(
        &self,
        record_id: &str,
        reason: &str,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        let sql = format!(
            "UPDATE data_retention_entries \
             SET retention_status = 'deleted', \
                 marked_for_deletion = TRUE, \
                 marked_for_deletion_at = $3, \
                 deletion_completed_at = $3, \
                 deletion_reason = $2, \
                 updated_at = $3 \
             WHERE record_id = $1 AND deletion_completed_at IS NULL \
             RETURNING {RETENTION_COLUMNS}"
        );
        let rows = sqlx::query_as::<_, RetentionEntryRow>(sql.as_str())
            .bind(record_id)
            .bind(reason)
            .bind(deleted_at)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to mark retention entries deleted for record '{record_id}': {error}"
                ))
            })?;

        entries_from_rows(rows)
    }

    async fn mark_termination_hold(
        &self,
        record_id: &str,
        held_at: DateTime<Utc>,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        let sql = format!(
            "UPDATE data_retention_entries \
             SET retention_status = 'termination_retention', updated_at = $2 \
             WHERE record_id = $1 \
               AND deletion_completed_at IS NULL \
               AND retention_status <> 'termination_retention' \
             RETURNING {RETENTION_COLUMNS}"
        );
        let rows = sqlx::query_as::<_, RetentionEntryRow>(sql.as_str())
            .bind(record_id)
            .bind(held_at)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to hold retention entries for record '{record_id}': {error}"
                ))
            })?;

        entries_from_rows(rows)
    }

    async fn list_entries(&self) -> AppResult<Vec<RetentionLedgerEntry>> {
        let sql = format!(
            "SELECT {RETENTION_COLUMNS} FROM data_retention_entries \
             ORDER BY retention_expires_at, id"
        );
        let rows = sqlx::query_as::<_, RetentionEntryRow>(sql.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list retention entries: {error}"))
            })?;

        entries_from_rows(rows)
    }

    async fn list_entries_for_subject(
        &self,
        data_subject_id: &str,
    ) -> AppResult<Vec<RetentionLedgerEntry>> {
        let sql = format!(
            "SELECT {RETENTION_COLUMNS} FROM data_retention_entries \
             WHERE data_subject_id = $1 \
             ORDER BY retention_expires_at, id"
        );
        let rows = sqlx::query_as::<_, RetentionEntryRow>(sql.as_str())
            .bind(data_subject_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list retention entries for subject '{data_subject_id}': {error}"
                ))
            })?;

        entries_from_rows(rows)
    }
}
