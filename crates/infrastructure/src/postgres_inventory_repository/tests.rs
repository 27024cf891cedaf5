use chrono::Utc;
use custodia_application::{InventoryListQuery, InventoryRepository};
use custodia_domain::{
    AccessControlLevel, CategoryId, DataCategory, DataInventoryEntry, InventoryEntryId,
    SensitivityLevel,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresInventoryRepository;
use crate::MIGRATOR;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres inventory tests: {error}");
    }

    Some(pool)
}

fn category(name: &str, sensitivity_level: SensitivityLevel) -> DataCategory {
    DataCategory {
        id: CategoryId::new(),
        name: name.to_owned(),
        description: Some(format!("Category for {name}")),
        sensitivity_level,
        created_at: Utc::now(),
    }
}

fn entry(data_name: &str, data_type: &str, category_id: CategoryId) -> DataInventoryEntry {
    let now = Utc::now();
    DataInventoryEntry {
        id: InventoryEntryId::new(),
        data_name: data_name.to_owned(),
        description: None,
        data_type: data_type.to_owned(),
        category_id,
        storage_location: format!("{data_type}_service.records"),
        purpose_of_processing: "Record keeping".to_owned(),
        legal_basis: "Legal obligation".to_owned(),
        retention_days: 365,
        retention_policy: None,
        data_subjects: Some("employees".to_owned()),
        recipients: None,
        third_party_sharing: false,
        third_party_recipients: None,
        encryption_status: "encrypted".to_owned(),
        access_control_level: AccessControlLevel::Restricted,
        processing_system: Some("HRMS".to_owned()),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn duplicate_category_names_surface_as_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresInventoryRepository::new(pool);
    let name = format!("Category {}", Uuid::new_v4());

    let first = repository
        .insert_category(category(name.as_str(), SensitivityLevel::High))
        .await;
    assert!(first.is_ok());

    let second = repository
        .insert_category(category(name.as_str(), SensitivityLevel::High))
        .await;
    assert!(matches!(second, Err(error) if error.is_conflict()));

    let found = repository.find_category_by_name(name.as_str()).await;
    assert!(matches!(found, Ok(Some(found)) if found.sensitivity_level == SensitivityLevel::High));
}

#[tokio::test]
async fn inventory_entries_are_unique_per_name_and_location() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresInventoryRepository::new(pool);
    let category = category(
        format!("Category {}", Uuid::new_v4()).as_str(),
        SensitivityLevel::Medium,
    );
    assert!(repository.insert_category(category.clone()).await.is_ok());

    let data_type = format!("type_{}", Uuid::new_v4().simple());
    let original = entry("Leave Records", data_type.as_str(), category.id);
    let inserted = repository.insert_entry(original.clone()).await;
    assert!(inserted.is_ok());

    let duplicate = repository
        .insert_entry(entry("Leave Records", data_type.as_str(), category.id))
        .await;
    assert!(matches!(duplicate, Err(error) if error.is_conflict()));

    let found = repository
        .find_entry("Leave Records", original.storage_location.as_str())
        .await;
    assert!(matches!(found, Ok(Some(found)) if found.id == original.id));

    let by_id = repository.find_entries_by_ids(&[original.id]).await;
    assert!(matches!(by_id, Ok(entries) if entries.len() == 1));
}

#[tokio::test]
async fn list_entries_filters_by_data_type_and_sensitivity() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresInventoryRepository::new(pool);
    let category = category(
        format!("Category {}", Uuid::new_v4()).as_str(),
        SensitivityLevel::Critical,
    );
    assert!(repository.insert_category(category.clone()).await.is_ok());

    let data_type = format!("type_{}", Uuid::new_v4().simple());
    for name in ["Bank Details", "Salary History"] {
        let inserted = repository
            .insert_entry(entry(name, data_type.as_str(), category.id))
            .await;
        assert!(inserted.is_ok());
    }

    let listed = repository
        .list_entries(&InventoryListQuery {
            data_type: Some(data_type.clone()),
            sensitivity_level: Some(SensitivityLevel::Critical),
            ..InventoryListQuery::default()
        })
        .await;
    let Ok(listed) = listed else {
        panic!("listing should succeed");
    };
    let names: Vec<&str> = listed.iter().map(|entry| entry.data_name.as_str()).collect();
    assert_eq!(names, vec!["Bank Details", "Salary History"]);

    let paged = repository
        .list_entries(&InventoryListQuery {
            data_type: Some(data_type),
            offset: 1,
            limit: 1,
            ..InventoryListQuery::default()
        })
        .await;
    assert!(matches!(paged, Ok(entries) if entries.len() == 1 && entries[0].data_name == "Salary History"));
}
