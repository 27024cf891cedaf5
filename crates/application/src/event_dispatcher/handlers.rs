use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use custodia_core::AppResult;
use custodia_domain::{EventEnvelope, RetentionLedgerEntry, classify};
use serde::Serialize;
use tracing::{info, warn};

use super::routes::{DATA_DELETED_TOPIC, GENERIC_RECORD_FIELDS, TrackIdentity, TrackRoute};
use super::{EventDispatcher, EventOutcome};

const DEFAULT_DELETION_REASON: &str = "User account deletion";
const GENERIC_SUBJECT_FIELDS: &[&str] = &["user_id", "employee_id"];

#[derive(Debug, Serialize)]
struct DataDeletedPayload<'a> {
    data_retention_id: String,
    data_inventory_id: String,
    record_id: &'a str,
    data_subject_id: Option<&'a str>,
    data_type: &'a str,
    deletion_reason: &'a str,
    deleted_at: DateTime<Utc>,
    deleted_by: &'a str,
}

impl EventDispatcher {
    pub(super) async fn track(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
        route: &TrackRoute,
        now: DateTime<Utc>,
    ) -> AppResult<EventOutcome> {
        let (record_id, subject_id) = match route.identity {
            TrackIdentity::RecordFirst {
                record_fields,
                subject_fields,
            } => {
                let Some(record_id) = envelope.payload_str(record_fields) else {
                    return Ok(malformed(topic, envelope, "missing record identifier"));
                };
                let subject_id = envelope
                    .payload_str(subject_fields)
                    .unwrap_or_else(|| record_id.clone());
                (Some(record_id), subject_id)
            }
            TrackIdentity::SubjectFirst {
                subject_fields,
                record_fields,
            } => {
                let Some(subject_id) = envelope.payload_str(subject_fields) else {
                    return Ok(malformed(topic, envelope, "missing data subject identifier"));
                };
                (envelope.payload_str(record_fields), subject_id)
            }
        };

        let Some(descriptor) = classify(route.classification) else {
            warn!(topic, classification = route.classification, "route has no classification");
            return Ok(EventOutcome::Ignored);
        };

        let resolution = self.registrar.resolve_or_create(descriptor).await?;
        if resolution.created {
            self.cache.invalidate_inventory().await;
        }

        if let Some(record_id) = record_id.as_deref() {
            self.ledger
                .upsert(&resolution.entry, record_id, Some(subject_id.as_str()), now)
                .await?;
            self.cache
                .invalidate_retention([subject_id.as_str()])
                .await;
            info!(
                topic,
                record_id,
                data_name = %resolution.entry.data_name,
                "tracked data record"
            );
        }

        self.cache
            .increment_counter(route.counter, now.date_naive())
            .await;
        Ok(EventOutcome::Applied)
    }

    pub(super) async fn refresh_access(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
        record_fields: &[&str],
        now: DateTime<Utc>,
    ) -> AppResult<EventOutcome> {
        let Some(record_id) = envelope.payload_str(record_fields) else {
            return Ok(malformed(topic, envelope, "missing record identifier"));
        };

        let touched = self.ledger.refresh_access(record_id.as_str(), now).await?;
        if touched.is_empty() {
            return Ok(EventOutcome::Applied);
        }

        self.cache
            .invalidate_retention(subject_ids(&touched).iter().copied())
            .await;
        info!(topic, record_id = %record_id, entries = touched.len(), "refreshed data access");
        Ok(EventOutcome::Applied)
    }

    pub(super) async fn mark_deleted(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
        record_fields: &[&str],
        now: DateTime<Utc>,
    ) -> AppResult<EventOutcome> {
        let Some(record_id) = envelope.payload_str(record_fields) else {
            return Ok(malformed(topic, envelope, "missing record identifier"));
        };
        let reason = envelope
            .payload_str(&["deletion_reason"])
            .unwrap_or_else(|| DEFAULT_DELETION_REASON.to_owned());

        let deleted = self
            .ledger
            .mark_deleted(record_id.as_str(), reason.as_str(), now)
            .await?;
        if deleted.is_empty() {
            return Ok(EventOutcome::Applied);
        }

        self.cache
            .invalidate_retention(subject_ids(&deleted).iter().copied())
            .await;
        self.cache
            .increment_counter("data_deleted", now.date_naive())
            .await;
        info!(topic, record_id = %record_id, entries = deleted.len(), "marked data deleted");

        let data_type = if topic.starts_with("user") {
            "user"
        } else {
            "employee"
        };
        for entry in &deleted {
            self.publish_data_deleted(envelope, entry, data_type, reason.as_str(), now)
                .await;
        }

        Ok(EventOutcome::Applied)
    }

    pub(super) async fn termination_hold(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
        record_fields: &[&str],
        now: DateTime<Utc>,
    ) -> AppResult<EventOutcome> {
        let Some(record_id) = envelope.payload_str(record_fields) else {
            return Ok(malformed(topic, envelope, "missing record identifier"));
        };

        let held = self
            .ledger
            .mark_termination_hold(record_id.as_str(), now)
            .await?;
        if held.is_empty() {
            return Ok(EventOutcome::Applied);
        }

        self.cache
            .invalidate_retention(subject_ids(&held).iter().copied())
            .await;
        info!(
            topic,
            record_id = %record_id,
            entries = held.len(),
            "flagged data for termination retention review"
        );
        Ok(EventOutcome::Applied)
    }

    pub(super) async fn classify_generic(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
        now: DateTime<Utc>,
    ) -> AppResult<EventOutcome> {
        let Some(descriptor) = classify(envelope.event_type.as_str()) else {
            info!(topic, event_type = %envelope.event_type, "no classification for event");
            return Ok(EventOutcome::Ignored);
        };
        let Some(record_id) = envelope.payload_str(GENERIC_RECORD_FIELDS) else {
            return Ok(malformed(topic, envelope, "missing record identifier"));
        };
        let subject_id = envelope.payload_str(GENERIC_SUBJECT_FIELDS);

        let resolution = self.registrar.resolve_or_create(descriptor).await?;
        if resolution.created {
            self.cache.invalidate_inventory().await;
        }

        self.ledger
            .upsert(&resolution.entry, record_id.as_str(), subject_id.as_deref(), now)
            .await?;
        self.cache.invalidate_retention(subject_id.as_deref()).await;
        info!(
            topic,
            event_type = %envelope.event_type,
            record_id = %record_id,
            "tracked data record through generic classification"
        );
        Ok(EventOutcome::Applied)
    }

    async fn publish_data_deleted(
        &self,
        cause: &EventEnvelope,
        entry: &RetentionLedgerEntry,
        data_type: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let payload = DataDeletedPayload {
            data_retention_id: entry.id.to_string(),
            data_inventory_id: entry.data_inventory_id.to_string(),
            record_id: entry.record_id.as_str(),
            data_subject_id: entry.data_subject_id.as_deref(),
            data_type,
            deletion_reason: reason,
            deleted_at: entry.deletion_completed_at.unwrap_or(now),
            deleted_by: "system",
        };
        let payload = match serde_json::to_value(&payload) {
            Ok(serde_json::Value::Object(payload)) => payload,
            Ok(_) => return,
            Err(error) => {
                warn!(error = %error, "failed to encode data deleted payload");
                return;
            }
        };

        let envelope = EventEnvelope::create(
            DATA_DELETED_TOPIC,
            payload,
            cause.metadata.correlation_id.clone(),
            cause.event_id.clone(),
        );
        if let Err(error) = publisher.publish(DATA_DELETED_TOPIC, &envelope).await {
            warn!(
                record_id = %entry.record_id,
                error = %error,
                "failed to publish data deleted event"
            );
        }
    }
}

fn malformed(topic: &str, envelope: &EventEnvelope, reason: &str) -> EventOutcome {
    warn!(topic, event_type = %envelope.event_type, reason, "dropping malformed event");
    EventOutcome::Malformed
}

fn subject_ids(entries: &[RetentionLedgerEntry]) -> BTreeSet<&str> {
    entries
        .iter()
        .filter_map(|entry| entry.data_subject_id.as_deref())
        .collect()
}
