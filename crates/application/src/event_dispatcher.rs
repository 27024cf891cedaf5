use std::sync::Arc;

use chrono::Utc;
use custodia_core::AppResult;
use custodia_domain::EventEnvelope;
use tracing::{debug, error, warn};

use crate::cache_coordinator::CacheAsideCoordinator;
use crate::compliance_ports::{DeliveredEvent, EventPublisher};
use crate::deduplication_gate::{DeduplicationGate, EventKey};
use crate::inventory_registrar::InventoryRegistrar;
use crate::retention_ledger::RetentionLedger;

mod handlers;
mod routes;

pub use routes::{DATA_DELETED_TOPIC, subscribed_topics};

const LOGGED_PAYLOAD_CHARS: usize = 512;

/// Terminal state of one delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Already processed; nothing was applied.
    Deduplicated,
    /// Side effects were applied and the event was marked processed.
    Applied,
    /// No classification or nothing to change.
    Ignored,
    /// Unparseable or missing a required identifier. Never retried.
    Malformed,
    /// A dependency failed; left unmarked so redelivery can retry it.
    Failed,
}

impl EventOutcome {
    /// Returns true when the transport may forget the delivery.
    #[must_use]
    pub fn should_acknowledge(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Routes inbound events through dedup, registrar, ledger and cache invalidation.
///
/// Dispatch never returns an error: each event ends in an [`EventOutcome`].
#[derive(Clone)]
pub struct EventDispatcher {
    registrar: InventoryRegistrar,
    ledger: RetentionLedger,
    gate: DeduplicationGate,
    cache: CacheAsideCoordinator,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl EventDispatcher {
    /// Creates a dispatcher from its pipeline stages.
    #[must_use]
    pub fn new(
        registrar: InventoryRegistrar,
        ledger: RetentionLedger,
        gate: DeduplicationGate,
        cache: CacheAsideCoordinator,
    ) -> Self {
        Self {
            registrar,
            ledger,
            gate,
            cache,
            publisher: None,
        }
    }

    /// Adds a publisher for data-deleted audit envelopes.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Processes one raw delivery.
    pub async fn dispatch(&self, delivery: &DeliveredEvent) -> EventOutcome {
        match EventEnvelope::from_body(delivery.topic.as_str(), delivery.body.as_str()) {
            Ok(envelope) => self.dispatch_envelope(delivery.topic.as_str(), &envelope).await,
            Err(error) => {
                warn!(
                    topic = %delivery.topic,
                    delivery_id = %delivery.delivery_id,
                    error = %error,
                    "dropping malformed event"
                );
                EventOutcome::Malformed
            }
        }
    }

    /// Processes one decoded envelope received on `topic`.
    pub async fn dispatch_envelope(&self, topic: &str, envelope: &EventEnvelope) -> EventOutcome {
        let key = EventKey::for_envelope(
            topic,
            envelope,
            routes::natural_identity(topic, envelope).as_deref(),
        );
        if let Some(key) = &key
            && self.gate.seen(key).await
        {
            debug!(topic, event_type = %envelope.event_type, "skipping duplicate event");
            return EventOutcome::Deduplicated;
        }

        match self.apply(topic, envelope).await {
            Ok(EventOutcome::Applied) => {
                if let Some(key) = &key {
                    self.gate.mark(key).await;
                }
                EventOutcome::Applied
            }
            Ok(outcome) => outcome,
            Err(app_error) => {
                error!(
                    topic,
                    event_type = %envelope.event_type,
                    event_id = envelope.event_id.as_deref().unwrap_or("-"),
                    payload = %truncated_payload(envelope),
                    error = %app_error,
                    "event handler failed"
                );
                EventOutcome::Failed
            }
        }
    }

    async fn apply(&self, topic: &str, envelope: &EventEnvelope) -> AppResult<EventOutcome> {
        let now = Utc::now();
        match routes::route_for(topic) {
            Some(routes::RouteAction::Track(route)) => {
                self.track(topic, envelope, &route, now).await
            }
            Some(routes::RouteAction::RefreshAccess { record_fields }) => {
                self.refresh_access(topic, envelope, record_fields, now)
                    .await
            }
            Some(routes::RouteAction::MarkDeleted { record_fields }) => {
                self.mark_deleted(topic, envelope, record_fields, now).await
            }
            Some(routes::RouteAction::TerminationHold { record_fields }) => {
                self.termination_hold(topic, envelope, record_fields, now)
                    .await
            }
            None => self.classify_generic(topic, envelope, now).await,
        }
    }
}

fn truncated_payload(envelope: &EventEnvelope) -> String {
    let rendered = serde_json::Value::Object(envelope.payload.clone()).to_string();
    match rendered.char_indices().nth(LOGGED_PAYLOAD_CHARS) {
        Some((cut, _)) => format!("{}...", &rendered[..cut]),
        None => rendered,
    }
}

#[cfg(test)]
mod tests;
