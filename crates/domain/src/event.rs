//! Event envelopes exchanged with the stream transport.

use chrono::{DateTime, Utc};
use custodia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Source service name stamped on published envelopes.
pub const SOURCE_SERVICE: &str = "compliance-service";

/// Tracing metadata carried by every envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Producing service.
    #[serde(default)]
    pub source_service: Option<String>,
    /// Identifier shared by every event in one business flow.
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Identifier of the event that caused this one.
    #[serde(default)]
    pub causation_id: Option<String>,
}

/// A lifecycle event with a loosely typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Producer-assigned identifier, absent for bare producer messages.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Event type, defaulted to the topic when the producer omits it.
    pub event_type: String,
    /// Production timestamp.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Event-specific fields.
    pub payload: Map<String, Value>,
    /// Tracing metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Parses a delivered body received on `topic`.
    pub fn from_body(topic: &str, body: &str) -> AppResult<Self> {
        let value: Value = serde_json::from_str(body).map_err(|error| {
            AppError::Validation(format!("event body on '{topic}' is not valid JSON: {error}"))
        })?;

        Self::from_value(topic, value)
    }

    /// Builds an envelope from a decoded JSON body received on `topic`.
    ///
    /// An object with an object-valued `payload` field is an envelope;
    /// any other object is a bare producer payload.
    pub fn from_value(topic: &str, value: Value) -> AppResult<Self> {
        let Value::Object(mut body) = value else {
            return Err(AppError::Validation(format!(
                "event body on '{topic}' must be a JSON object"
            )));
        };

        if !matches!(body.get("payload"), Some(Value::Object(_))) {
            // Bare payloads may carry their own `event_type` field with a
            // producer-local meaning, so the topic always names the event.
            return Ok(Self {
                event_id: None,
                event_type: topic.to_owned(),
                timestamp: None,
                payload: body,
                metadata: EventMetadata::default(),
            });
        }

        let payload = match body.remove("payload") {
            Some(Value::Object(payload)) => payload,
            _ => Map::new(),
        };
        let event_id = body.get("event_id").and_then(scalar_text);
        let event_type = body
            .get("event_type")
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(topic)
            .to_owned();
        let timestamp = body
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|value| value.with_timezone(&Utc));
        let metadata = body
            .remove("metadata")
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        Ok(Self {
            event_id,
            event_type,
            timestamp,
            payload,
            metadata,
        })
    }

    /// Creates an outbound envelope stamped with this service as source.
    #[must_use]
    pub fn create(
        event_type: impl Into<String>,
        payload: Map<String, Value>,
        correlation_id: Option<String>,
        causation_id: Option<String>,
    ) -> Self {
        Self {
            event_id: Some(Uuid::new_v4().simple().to_string()),
            event_type: event_type.into(),
            timestamp: Some(Utc::now()),
            payload,
            metadata: EventMetadata {
                source_service: Some(SOURCE_SERVICE.to_owned()),
                correlation_id: Some(
                    correlation_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
                ),
                causation_id,
            },
        }
    }

    /// Returns the first non-empty payload field among `keys`.
    ///
    /// Numeric identifiers are accepted and rendered as text.
    #[must_use]
    pub fn payload_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.payload.get(*key))
            .find_map(scalar_text)
    }

    /// Serializes the envelope for publishing.
    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize '{}' envelope: {error}",
                self.event_type
            ))
        })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
