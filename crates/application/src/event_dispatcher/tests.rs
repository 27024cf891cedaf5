use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use custodia_domain::{EventEnvelope, RetentionStatus};
use serde_json::{Value, json};

use crate::cache_coordinator::CacheAsideCoordinator;
use crate::compliance_policy::CacheTtlPolicy;
use crate::compliance_ports::DeliveredEvent;
use crate::deduplication_gate::DeduplicationGate;
use crate::inventory_registrar::InventoryRegistrar;
use crate::retention_ledger::RetentionLedger;
use crate::test_support::{
    FakeCache, FakeInventoryRepository, FakePublisher, FakeRetentionRepository,
};

use super::routes::natural_identity;
use super::{DATA_DELETED_TOPIC, EventDispatcher, EventOutcome, subscribed_topics};

struct Harness {
    inventory: Arc<FakeInventoryRepository>,
    retention: Arc<FakeRetentionRepository>,
    cache: Arc<FakeCache>,
    publisher: Arc<FakePublisher>,
    dispatcher: EventDispatcher,
}

fn harness() -> Harness {
    let inventory = Arc::new(FakeInventoryRepository::default());
    let retention = Arc::new(FakeRetentionRepository::default());
    let cache = Arc::new(FakeCache::default());
    let publisher = Arc::new(FakePublisher::default());
    let dispatcher = EventDispatcher::new(
        InventoryRegistrar::new(inventory.clone(), 365),
        RetentionLedger::new(retention.clone()),
        DeduplicationGate::new(cache.clone(), 604_800),
        CacheAsideCoordinator::new(cache.clone(), CacheTtlPolicy::default()),
    )
    .with_publisher(publisher.clone());

    Harness {
        inventory,
        retention,
        cache,
        publisher,
        dispatcher,
    }
}

fn delivery(topic: &str, body: &Value) -> DeliveredEvent {
    DeliveredEvent {
        delivery_id: format!("{topic}-delivery"),
        topic: topic.to_owned(),
        body: body.to_string(),
    }
}

fn envelope_body(event_id: &str, event_type: &str, payload: Value) -> Value {
    json!({
        "event_id": event_id,
        "event_type": event_type,
        "timestamp": "2025-05-01T08:00:00Z",
        "payload": payload,
        "metadata": {
            "source_service": "employee-service",
            "correlation_id": "corr-1"
        }
    })
}

#[tokio::test]
async fn employee_created_tracks_record_for_linked_user() {
    let harness = harness();
    let body = envelope_body(
        "evt-1",
        "employee-created",
        json!({ "employee_id": "emp-1", "user_id": "user-1" }),
    );

    let outcome = harness
        .dispatcher
        .dispatch(&delivery("employee-created", &body))
        .await;

    assert_eq!(outcome, EventOutcome::Applied);
    let entries = harness.retention.snapshot().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record_id, "emp-1");
    assert_eq!(entries[0].data_subject_id.as_deref(), Some("user-1"));

    let inventory = harness.inventory.entries.lock().await.clone();
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].data_name, "Employee Personal Data");
    assert_eq!(entries[0].data_inventory_id, inventory[0].id);

    let counter_key = format!("counter:data_collected:{}", Utc::now().format("%Y-%m-%d"));
    assert!(harness.cache.contains(counter_key.as_str()).await);
}

#[tokio::test]
async fn redelivered_event_has_no_further_effect() {
    let harness = harness();
    let body = envelope_body("evt-2", "user-created", json!({ "user_id": "user-2" }));
    let event = delivery("user-created", &body);

    let first = harness.dispatcher.dispatch(&event).await;
    let after_first = harness.retention.snapshot().await;
    let second = harness.dispatcher.dispatch(&event).await;

    assert_eq!(first, EventOutcome::Applied);
    assert_eq!(second, EventOutcome::Deduplicated);
    assert_eq!(harness.retention.snapshot().await, after_first);
    assert_eq!(harness.inventory.entries.lock().await.len(), 1);
}

#[tokio::test]
async fn distinct_events_for_one_record_refresh_a_single_entry() {
    let harness = harness();
    let first = envelope_body("evt-3", "user-created", json!({ "user_id": "user-3" }));
    let second = envelope_body("evt-4", "user-created", json!({ "user_id": "user-3" }));

    harness
        .dispatcher
        .dispatch(&delivery("user-created", &first))
        .await;
    let created = harness.retention.snapshot().await;
    let outcome = harness
        .dispatcher
        .dispatch(&delivery("user-onboarding-initiated", &second))
        .await;

    assert_eq!(outcome, EventOutcome::Applied);
    let refreshed = harness.retention.snapshot().await;
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].id, created[0].id);
    assert!(refreshed[0].data_last_accessed_at >= created[0].data_last_accessed_at);
}

#[tokio::test]
async fn unmapped_event_types_change_nothing() {
    let harness = harness();
    let body = envelope_body(
        "evt-5",
        "payroll-export-generated",
        json!({ "id": "export-1", "employee_id": "emp-5" }),
    );

    let outcome = harness
        .dispatcher
        .dispatch(&delivery("payroll-export-generated", &body))
        .await;

    assert_eq!(outcome, EventOutcome::Ignored);
    assert!(harness.inventory.entries.lock().await.is_empty());
    assert!(harness.inventory.categories.lock().await.is_empty());
    assert!(harness.retention.snapshot().await.is_empty());
}

#[tokio::test]
async fn generic_handler_tracks_classified_event_types() {
    let harness = harness();
    let body = envelope_body(
        "evt-6",
        "leave-approved",
        json!({ "leave_id": "leave-1", "employee_id": "emp-6" }),
    );

    let outcome = harness
        .dispatcher
        .dispatch(&delivery("hr-events", &body))
        .await;

    assert_eq!(outcome, EventOutcome::Applied);
    let entries = harness.retention.snapshot().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record_id, "emp-6");
    assert_eq!(entries[0].data_subject_id.as_deref(), Some("emp-6"));
}

#[tokio::test]
async fn bare_attendance_payload_without_record_only_registers_inventory() {
    let harness = harness();
    let body = json!({ "employee_id": "emp-7", "event_type": "checkin" });

    let outcome = harness
        .dispatcher
        .dispatch(&delivery("attendance-checkin", &body))
        .await;

    assert_eq!(outcome, EventOutcome::Applied);
    assert_eq!(harness.inventory.entries.lock().await.len(), 1);
    assert!(harness.retention.snapshot().await.is_empty());
}

#[tokio::test]
async fn missing_identifiers_and_bad_bodies_are_malformed() {
    let harness = harness();
    let missing_user = envelope_body("evt-8", "user-created", json!({ "email": "a@b.c" }));
    let missing_subject = json!({ "leave_id": "leave-8" });
    let not_json = DeliveredEvent {
        delivery_id: "1-0".to_owned(),
        topic: "user-created".to_owned(),
        body: "{not json".to_owned(),
    };

    let outcomes = [
        harness
            .dispatcher
            .dispatch(&delivery("user-created", &missing_user))
            .await,
        harness
            .dispatcher
            .dispatch(&delivery("leave-requested", &missing_subject))
            .await,
        harness.dispatcher.dispatch(&not_json).await,
    ];

    assert!(outcomes.iter().all(|outcome| *outcome == EventOutcome::Malformed));
    assert!(outcomes.iter().all(EventOutcome::should_acknowledge));
    assert!(harness.inventory.entries.lock().await.is_empty());
}

#[tokio::test]
async fn deletion_publishes_audit_envelope_once() {
    let harness = harness();
    let created = envelope_body("evt-9", "user-created", json!({ "user_id": "user-9" }));
    let deleted = envelope_body(
        "evt-10",
        "user-deleted",
        json!({ "user_id": "user-9", "deletion_reason": "employee termination" }),
    );
    let deleted_again = envelope_body("evt-11", "user-deleted", json!({ "user_id": "user-9" }));

    harness
        .dispatcher
        .dispatch(&delivery("user-created", &created))
        .await;
    let first = harness
        .dispatcher
        .dispatch(&delivery("user-deleted", &deleted))
        .await;
    let deleted_at = harness.retention.snapshot().await[0].deletion_completed_at;
    let second = harness
        .dispatcher
        .dispatch(&delivery("user-deleted", &deleted_again))
        .await;

    assert_eq!(first, EventOutcome::Applied);
    assert_eq!(second, EventOutcome::Applied);

    let entries = harness.retention.snapshot().await;
    assert_eq!(entries[0].retention_status, RetentionStatus::Deleted);
    assert_eq!(entries[0].deletion_completed_at, deleted_at);
    assert_eq!(
        entries[0].deletion_reason.as_deref(),
        Some("employee termination")
    );

    let published = harness.publisher.published.lock().await.clone();
    assert_eq!(published.len(), 1);
    let (topic, envelope) = &published[0];
    assert_eq!(topic, DATA_DELETED_TOPIC);
    assert_eq!(envelope.event_type, DATA_DELETED_TOPIC);
    assert_eq!(envelope.metadata.causation_id.as_deref(), Some("evt-10"));
    assert_eq!(envelope.metadata.correlation_id.as_deref(), Some("corr-1"));
    assert_eq!(envelope.payload_str(&["data_type"]).as_deref(), Some("user"));
    assert_eq!(envelope.payload_str(&["deleted_by"]).as_deref(), Some("system"));
    assert_eq!(envelope.payload_str(&["record_id"]).as_deref(), Some("user-9"));
}

#[tokio::test]
async fn publisher_outage_does_not_fail_deletion() {
    let harness = harness();
    harness.publisher.offline.store(true, Ordering::SeqCst);
    let created = envelope_body("evt-12", "employee-created", json!({ "employee_id": "emp-12" }));
    let deleted = envelope_body("evt-13", "employee-deleted", json!({ "employee_id": "emp-12" }));

    harness
        .dispatcher
        .dispatch(&delivery("employee-created", &created))
        .await;
    let outcome = harness
        .dispatcher
        .dispatch(&delivery("employee-deleted", &deleted))
        .await;

    assert_eq!(outcome, EventOutcome::Applied);
    let entries = harness.retention.snapshot().await;
    assert_eq!(
        entries[0].deletion_reason.as_deref(),
        Some("User account deletion")
    );
}

#[tokio::test]
async fn termination_flags_entries_without_moving_expiry() {
    let harness = harness();
    let created = envelope_body("evt-14", "employee-created", json!({ "employee_id": "emp-14" }));
    let terminated = envelope_body(
        "evt-15",
        "employee-terminated",
        json!({ "employee_id": "emp-14", "termination_reason": "resigned" }),
    );

    harness
        .dispatcher
        .dispatch(&delivery("employee-created", &created))
        .await;
    let expires_at = harness.retention.snapshot().await[0].retention_expires_at;
    let outcome = harness
        .dispatcher
        .dispatch(&delivery("employee-terminated", &terminated))
        .await;

    assert_eq!(outcome, EventOutcome::Applied);
    let entries = harness.retention.snapshot().await;
    assert_eq!(entries[0].retention_status, RetentionStatus::TerminationRetention);
    assert_eq!(entries[0].retention_expires_at, expires_at);
}

#[tokio::test]
async fn failed_events_stay_eligible_for_redelivery() {
    let harness = harness();
    let body = envelope_body("evt-16", "user-created", json!({ "user_id": "user-16" }));
    let event = delivery("user-created", &body);

    harness.retention.offline.store(true, Ordering::SeqCst);
    let failed = harness.dispatcher.dispatch(&event).await;
    harness.retention.offline.store(false, Ordering::SeqCst);
    let retried = harness.dispatcher.dispatch(&event).await;

    assert_eq!(failed, EventOutcome::Failed);
    assert!(!failed.should_acknowledge());
    assert_eq!(retried, EventOutcome::Applied);
    assert_eq!(harness.retention.snapshot().await.len(), 1);
}

#[tokio::test]
async fn cache_outage_does_not_block_ingestion() {
    let harness = harness();
    harness.cache.offline.store(true, Ordering::SeqCst);
    let body = envelope_body("evt-17", "user-created", json!({ "user_id": "user-17" }));

    let outcome = harness
        .dispatcher
        .dispatch(&delivery("user-created", &body))
        .await;

    assert_eq!(outcome, EventOutcome::Applied);
    assert_eq!(harness.retention.snapshot().await.len(), 1);
}

#[test]
fn subscribed_topics_cover_routes_and_generic_topics() {
    let topics: Vec<&str> = subscribed_topics().collect();
    assert!(topics.contains(&"employee-contract-ended"));
    assert!(topics.contains(&"user-onboarding-failed"));
    assert!(!topics.contains(&DATA_DELETED_TOPIC));
}

#[tokio::test]
async fn id_less_records_of_one_subject_are_tracked_separately() {
    let harness = harness();
    let first = json!({ "employee_id": "emp-1", "id": "leave-1" });
    let second = json!({ "employee_id": "emp-1", "id": "leave-2" });

    let outcomes = [
        harness
            .dispatcher
            .dispatch(&delivery("leave-requested", &first))
            .await,
        harness
            .dispatcher
            .dispatch(&delivery("leave-requested", &second))
            .await,
        harness
            .dispatcher
            .dispatch(&delivery("leave-requested", &second))
            .await,
    ];

    assert_eq!(
        outcomes,
        [
            EventOutcome::Applied,
            EventOutcome::Applied,
            EventOutcome::Deduplicated
        ]
    );
    let mut records: Vec<String> = harness
        .retention
        .snapshot()
        .await
        .into_iter()
        .map(|entry| entry.record_id)
        .collect();
    records.sort();
    assert_eq!(records, ["leave-1", "leave-2"]);
}

#[tokio::test]
async fn id_less_access_refreshes_are_never_suppressed() {
    let harness = harness();
    let created = envelope_body("evt-18", "employee-created", json!({ "employee_id": "emp-5" }));
    let updated = json!({ "employee_id": "emp-5" });

    harness
        .dispatcher
        .dispatch(&delivery("employee-created", &created))
        .await;
    let first = harness
        .dispatcher
        .dispatch(&delivery("employee-updated", &updated))
        .await;
    let second = harness
        .dispatcher
        .dispatch(&delivery("employee-updated", &updated))
        .await;

    assert_eq!(first, EventOutcome::Applied);
    assert_eq!(second, EventOutcome::Applied);
    assert!(
        !harness
            .cache
            .contains("event_processed:natural:employee-updated:emp-5")
            .await
    );
}

#[test]
fn natural_identity_prefers_the_routed_record() {
    let Ok(leave) = EventEnvelope::from_value(
        "leave-requested",
        json!({ "employee_id": "emp-1", "id": "leave-1" }),
    ) else {
        panic!("leave body should parse");
    };
    let Ok(checkin) = EventEnvelope::from_value("attendance-checkin", json!({ "employee_id": "emp-2" }))
    else {
        panic!("attendance body should parse");
    };
    let Ok(deleted) = EventEnvelope::from_value("user-deleted", json!({ "user_id": "user-3" })) else {
        panic!("deletion body should parse");
    };

    assert_eq!(
        natural_identity("leave-requested", &leave).as_deref(),
        Some("leave-1")
    );
    assert_eq!(
        natural_identity("attendance-checkin", &checkin).as_deref(),
        Some("emp-2")
    );
    assert_eq!(
        natural_identity("user-deleted", &deleted).as_deref(),
        Some("user-3")
    );
    assert_eq!(natural_identity("employee-updated", &leave), None);
}
