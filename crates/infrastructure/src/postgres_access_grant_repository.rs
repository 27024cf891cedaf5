use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_application::AccessGrantRepository;
use custodia_core::{AppError, AppResult};
use custodia_domain::{AccessGrant, AccessGrantId, AccessLevel, InventoryEntryId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed reader for employee data access grants.
#[derive(Clone)]
pub struct PostgresAccessGrantRepository {
    pool: PgPool,
}

impl PostgresAccessGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AccessGrantRow {
    id: Uuid,
    employee_id: String,
    data_inventory_id: Uuid,
    access_level: String,
    access_reason: String,
    role_based: bool,
    role_name: Option<String>,
    granted_by: Option<String>,
    granted_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl TryFrom<AccessGrantRow> for AccessGrant {
    type Error = AppError;

    fn try_from(row: AccessGrantRow) -> AppResult<Self> {
        Ok(Self {
            id: AccessGrantId::from_uuid(row.id),
            employee_id: row.employee_id,
            data_inventory_id: InventoryEntryId::from_uuid(row.data_inventory_id),
            access_level: AccessLevel::from_str(row.access_level.as_str())?,
            access_reason: row.access_reason,
            role_based: row.role_based,
            role_name: row.role_name,
            granted_by: row.granted_by,
            granted_at: row.granted_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
        })
    }
}

#[async_trait]
impl AccessGrantRepository for PostgresAccessGrantRepository {
    async fn list_active_grants(&self, employee_id: &str) -> AppResult<Vec<AccessGrant>> {
        let rows = sqlx::query_as::<_, AccessGrantRow>(
            r#"
            SELECT
                id,
                employee_id,
                data_inventory_id,
                access_level,
                access_reason,
                role_based,
                role_name,
                granted_by,
                granted_at,
                expires_at,
                is_active
            FROM data_access_grants
            WHERE employee_id = $1 AND is_active
            ORDER BY granted_at DESC
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list access grants for employee '{employee_id}': {error}"
            ))
        })?;

        rows.into_iter().map(AccessGrant::try_from).collect()
    }
}
