use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_application::{InventoryListQuery, InventoryRepository};
use custodia_core::{AppError, AppResult};
use custodia_domain::{
    AccessControlLevel, CategoryId, DataCategory, DataInventoryEntry, InventoryEntryId,
    SensitivityLevel,
};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const ENTRY_COLUMNS: &str = "e.id, e.data_name, e.description, e.data_type, e.category_id, \
    e.storage_location, e.purpose_of_processing, e.legal_basis, e.retention_days, \
    e.retention_policy, e.data_subjects, e.recipients, e.third_party_sharing, \
    e.third_party_recipients, e.encryption_status, e.access_control_level, \
    e.processing_system, e.created_at, e.updated_at";

/// PostgreSQL-backed category and inventory repository.
#[derive(Clone)]
pub struct PostgresInventoryRepository {
    pool: PgPool,
}

impl PostgresInventoryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    sensitivity_level: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for DataCategory {
    type Error = AppError;

    fn try_from(row: CategoryRow) -> AppResult<Self> {
        Ok(Self {
            id: CategoryId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            sensitivity_level: SensitivityLevel::from_str(row.sensitivity_level.as_str())?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InventoryEntryRow {
    id: Uuid,
    data_name: String,
    description: Option<String>,
    data_type: String,
    category_id: Uuid,
    storage_location: String,
    purpose_of_processing: String,
    legal_basis: String,
    retention_days: i32,
    retention_policy: Option<String>,
    data_subjects: Option<String>,
    recipients: Option<String>,
    third_party_sharing: bool,
    third_party_recipients: Option<String>,
    encryption_status: String,
    access_control_level: String,
    processing_system: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InventoryEntryRow> for DataInventoryEntry {
    type Error = AppError;

    fn try_from(row: InventoryEntryRow) -> AppResult<Self> {
        let retention_days = u32::try_from(row.retention_days).map_err(|error| {
            AppError::Internal(format!(
                "invalid retention_days '{}' stored for inventory entry '{}': {error}",
                row.retention_days, row.id
            ))
        })?;

        Ok(Self {
            id: InventoryEntryId::from_uuid(row.id),
            data_name: row.data_name,
            description: row.description,
            data_type: row.data_type,
            category_id: CategoryId::from_uuid(row.category_id),
            storage_location: row.storage_location,
            purpose_of_processing: row.purpose_of_processing,
            legal_basis: row.legal_basis,
            retention_days,
            retention_policy: row.retention_policy,
            data_subjects: row.data_subjects,
            recipients: row.recipients,
            third_party_sharing: row.third_party_sharing,
            third_party_recipients: row.third_party_recipients,
            encryption_status: row.encryption_status,
            access_control_level: AccessControlLevel::from_str(row.access_control_level.as_str())?,
            processing_system: row.processing_system,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn entries_from_rows(rows: Vec<InventoryEntryRow>) -> AppResult<Vec<DataInventoryEntry>> {
    rows.into_iter().map(DataInventoryEntry::try_from).collect()
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        return true;
    }

    false
}

#[async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    async fn find_category_by_name(&self, name: &str) -> AppResult<Option<DataCategory>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, name, description, sensitivity_level, created_at
            FROM data_categories
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find data category '{name}': {error}"))
        })?;

        row.map(DataCategory::try_from).transpose()
    }

    async fn insert_category(&self, category: DataCategory) -> AppResult<DataCategory> {
        let result = sqlx::query(
            r#"
            INSERT INTO data_categories (id, name, description, sensitivity_level, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(category.name.as_str())
        .bind(category.description.as_deref())
        .bind(category.sensitivity_level.as_str())
        .bind(category.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(category),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
                "data category '{}' already exists",
                category.name
            ))),
            Err(error) => Err(AppError::Internal(format!(
                "failed to insert data category '{}': {error}",
                category.name
            ))),
        }
    }

    async fn list_categories(&self) -> AppResult<Vec<DataCategory>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, name, description, sensitivity_level, created_at
            FROM data_categories
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list data categories: {error}")))?;

        rows.into_iter().map(DataCategory::try_from).collect()
    }

    async fn find_entry(
        &self,
        data_name: &str,
        storage_location: &str,
    ) -> AppResult<Option<DataInventoryEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM data_inventory_entries e \
             WHERE e.data_name = $1 AND e.storage_location = $2"
        );
        let row = sqlx::query_as::<_, InventoryEntryRow>(sql.as_str())
            .bind(data_name)
            .bind(storage_location)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to find inventory entry '{data_name}' at '{storage_location}': {error}"
                ))
            })?;

        row.map(DataInventoryEntry::try_from).transpose()
    }

    async fn find_entries_by_ids(
        &self,
        ids: &[InventoryEntryId],
    ) -> AppResult<Vec<DataInventoryEntry>> {
        let uuids: Vec<Uuid> = ids.iter().map(InventoryEntryId::as_uuid).collect();
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM data_inventory_entries e WHERE e.id = ANY($1)");
        let rows = sqlx::query_as::<_, InventoryEntryRow>(sql.as_str())
            .bind(uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load inventory entries by id: {error}"))
            })?;

        entries_from_rows(rows)
    }

    async fn insert_entry(&self, entry: DataInventoryEntry) -> AppResult<DataInventoryEntry> {
        let retention_days = i32::try_from(entry.retention_days).map_err(|error| {
            AppError::Validation(format!(
                "retention_days '{}' is out of range: {error}",
                entry.retention_days
            ))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO data_inventory_entries (
                id,
                data_name,
                description,
                data_type,
                category_id,
                storage_location,
                purpose_of_processing,
                legal_basis,
                retention_days,
                retention_policy,
                data_subjects,
                recipients,
                third_party_sharing,
                third_party_recipients,
                encryption_status,
                access_control_level,
                processing_system,
                created_at,
                updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.data_name.as_str())
        .bind(entry.description.as_deref())
        .bind(entry.data_type.as_str())
        .bind(entry.category_id.as_uuid())
        .bind(entry.storage_location.as_str())
        .bind(entry.purpose_of_processing.as_str())
        .bind(entry.legal_basis.as_str())
        .bind(retention_days)
        .bind(entry.retention_policy.as_deref())
        .bind(entry.data_subjects.as_deref())
        .bind(entry.recipients.as_deref())
        .bind(entry.third_party_sharing)
        .bind(entry.third_party_recipients.as_deref())
        .bind(entry.encryption_status.as_str())
        .bind(entry.access_control_level.as_str())
        .bind(entry.processing_system.as_deref())
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(entry),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
                "inventory entry '{}' at '{}' already exists",
                entry.data_name, entry.storage_location
            ))),
            Err(error) => Err(AppError::Internal(format!(
                "failed to insert inventory entry '{}': {error}",
                entry.data_name
            ))),
        }
    }

    async fn list_entries(
        &self,
        query: &InventoryListQuery,
    ) -> AppResult<Vec<DataInventoryEntry>> {
        let limit = i64::try_from(query.limit).map_err(|error| {
            AppError::Validation(format!("invalid inventory query limit: {error}"))
        })?;
        let offset = i64::try_from(query.offset).map_err(|error| {
            AppError::Validation(format!("invalid inventory query offset: {error}"))
        })?;

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        builder.push(ENTRY_COLUMNS);
        builder.push(
            " FROM data_inventory_entries e \
             JOIN data_categories c ON c.id = e.category_id WHERE TRUE",
        );

        if let Some(category_id) = query.category_id {
            builder.push(" AND e.category_id = ");
            builder.push_bind(category_id.as_uuid());
        }
        if let Some(data_type) = query.data_type.as_deref() {
            builder.push(" AND e.data_type = ");
            builder.push_bind(data_type);
        }
        if let Some(sensitivity_level) = query.sensitivity_level {
            builder.push(" AND c.sensitivity_level = ");
            builder.push_bind(sensitivity_level.as_str());
        }

        builder.push(" ORDER BY e.data_name, e.storage_location LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<InventoryEntryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list inventory entries: {error}"))
            })?;

        entries_from_rows(rows)
    }
}

#[cfg(test)]
mod tests;
