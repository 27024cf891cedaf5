use std::sync::Arc;

use custodia_domain::EventEnvelope;
use tracing::warn;

use crate::compliance_ports::ComplianceCache;

const MARKER_PREFIX: &str = "event_processed";
const MARKER_VALUE: &str = "1";

/// Identity of an event for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// Built from the producer's event identifier.
    Identified(String),
    /// Built from event type and a payload identifier. Best effort only.
    Natural(String),
}

impl EventKey {
    /// Derives the key for an envelope delivered on `topic`.
    ///
    /// `natural_identity` names the record an id-less event acts on. Returns
    /// `None` when neither an event id nor a natural identity is available.
    #[must_use]
    pub fn for_envelope(
        topic: &str,
        envelope: &EventEnvelope,
        natural_identity: Option<&str>,
    ) -> Option<Self> {
        if let Some(event_id) = envelope
            .event_id
            .as_deref()
            .filter(|event_id| !event_id.trim().is_empty())
        {
            return Some(Self::Identified(format!("{topic}:{event_id}")));
        }

        natural_identity
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
            .map(|identity| Self::Natural(format!("{}:{identity}", envelope.event_type)))
    }

    /// Returns the cache key of the processed-event marker.
    #[must_use]
    pub fn marker_key(&self) -> String {
        match self {
            Self::Identified(identity) => format!("{MARKER_PREFIX}:{identity}"),
            Self::Natural(identity) => format!("{MARKER_PREFIX}:natural:{identity}"),
        }
    }

    /// Returns true for keys derived from payload content.
    #[must_use]
    pub fn is_natural(&self) -> bool {
        matches!(self, Self::Natural(_))
    }
}

/// Time-bounded idempotence guard over the shared cache.
///
/// Marker loss only risks re-applying idempotent handlers, so cache errors
/// read as "not seen" and failed marks are logged and ignored.
#[derive(Clone)]
pub struct DeduplicationGate {
    cache: Arc<dyn ComplianceCache>,
    ttl_seconds: u64,
}

impl DeduplicationGate {
    /// Creates a gate whose markers live for `ttl_seconds`.
    #[must_use]
    pub fn new(cache: Arc<dyn ComplianceCache>, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    /// Returns true when the event's side effects were already applied.
    pub async fn seen(&self, key: &EventKey) -> bool {
        match self.cache.get(key.marker_key().as_str()).await {
            Ok(marker) => marker.is_some(),
            Err(error) => {
                warn!(error = %error, "dedup lookup failed, treating event as new");
                false
            }
        }
    }

    /// Records that the event's side effects were applied.
    pub async fn mark(&self, key: &EventKey) {
        if let Err(error) = self
            .cache
            .set_with_ttl(key.marker_key().as_str(), MARKER_VALUE, self.ttl_seconds)
            .await
        {
            warn!(error = %error, "failed to record processed event marker");
        }
    }
}
