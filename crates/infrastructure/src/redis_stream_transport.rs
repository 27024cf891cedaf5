//! Redis Streams event transport.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use custodia_application::{DeliveredEvent, EventPublisher, EventStream};
use custodia_core::{AppError, AppResult};
use custodia_domain::EventEnvelope;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::streams::{StreamReadOptions, StreamReadReply};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Stream entry field that carries the JSON envelope.
pub const ENVELOPE_FIELD: &str = "envelope";

const NEW_ENTRIES_ID: &str = ">";
const PENDING_ENTRIES_ID: &str = "0";
/// Extra time a blocking read may take beyond its `BLOCK` window.
const BLOCKING_READ_MARGIN: Duration = Duration::from_secs(2);

/// Consumer group identity and read tuning for the stream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConsumerSettings {
    /// Consumer group shared by every worker.
    pub group: String,
    /// Name of this consumer within the group.
    pub consumer: String,
    /// Maximum entries read per stream per poll.
    pub batch_size: usize,
    /// How long one poll blocks waiting for new entries.
    pub block: Duration,
    /// How often unacknowledged entries are re-read.
    pub pending_retry_interval: Duration,
}

impl StreamConsumerSettings {
    /// Response timeout for the stream connection.
    ///
    /// A blocking `XREADGROUP` legitimately stays silent for the whole block
    /// window, so the client must wait longer than that.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        self.block.saturating_add(BLOCKING_READ_MARGIN)
    }
}

/// Redis Streams adapter for both consuming and publishing envelopes.
///
/// One stream per topic; at-least-once delivery through a consumer group.
/// Entries that are never acknowledged stay in the consumer's pending list
/// and are handed out again on the next pending sweep.
pub struct RedisStreamTransport {
    connection: ConnectionManager,
    topics: Vec<String>,
    settings: StreamConsumerSettings,
    last_pending_sweep: Mutex<Option<Instant>>,
}

impl RedisStreamTransport {
    /// Creates a transport subscribed to the given topics.
    #[must_use]
    pub fn new(
        connection: ConnectionManager,
        topics: Vec<String>,
        settings: StreamConsumerSettings,
    ) -> Self {
        Self {
            connection,
            topics,
            settings,
            last_pending_sweep: Mutex::new(None),
        }
    }

    /// Opens a dedicated stream connection sized for blocking reads.
    pub async fn connect(
        client: &redis::Client,
        topics: Vec<String>,
        settings: StreamConsumerSettings,
    ) -> AppResult<Self> {
        let config =
            ConnectionManagerConfig::new().set_response_timeout(Some(settings.response_timeout()));
        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to open redis stream connection: {error}"))
            })?;

        Ok(Self::new(connection, topics, settings))
    }

    /// Creates the consumer group on every subscribed stream, creating streams as needed.
    pub async fn ensure_consumer_groups(&self) -> AppResult<()> {
        let mut connection = self.connection.clone();
        for topic in &self.topics {
            let created: redis::RedisResult<()> = connection
                .xgroup_create_mkstream(topic.as_str(), self.settings.group.as_str(), "$")
                .await;

            match created {
                Ok(()) => info!(
                    topic = %topic,
                    group = %self.settings.group,
                    "created consumer group"
                ),
                Err(error) if error.code() == Some("BUSYGROUP") => {
                    debug!(topic = %topic, group = %self.settings.group, "consumer group exists");
                }
                Err(error) => {
                    return Err(AppError::Unavailable(format!(
                        "failed to create consumer group '{}' on stream '{topic}': {error}",
                        self.settings.group
                    )));
                }
            }
        }

        Ok(())
    }

    async fn pending_sweep_due(&self) -> bool {
        let mut last_sweep = self.last_pending_sweep.lock().await;
        let now = Instant::now();
        let due = last_sweep.is_none_or(|last_sweep| {
            now.duration_since(last_sweep) >= self.settings.pending_retry_interval
        });
        if due {
            *last_sweep = Some(now);
        }

        due
    }

    async fn read_group(&self, start_id: &str, block: bool) -> AppResult<Vec<DeliveredEvent>> {
        if self.topics.is_empty() {
            return Ok(Vec::new());
        }

        let mut options = StreamReadOptions::default()
            .group(self.settings.group.as_str(), self.settings.consumer.as_str())
            .count(self.settings.batch_size);
        if block {
            let block_millis = usize::try_from(self.settings.block.as_millis()).unwrap_or(usize::MAX);
            options = options.block(block_millis);
        }

        let start_ids = vec![start_id; self.topics.len()];
        let mut connection = self.connection.clone();
        let reply: Option<StreamReadReply> = connection
            .xread_options(&self.topics, &start_ids, &options)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to read event streams: {error}"))
            })?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut deliveries = Vec::new();
        for stream in reply.keys {
            for entry in stream.ids {
                let body = entry.get::<String>(ENVELOPE_FIELD).unwrap_or_default();
                deliveries.push(DeliveredEvent {
                    delivery_id: entry.id,
                    topic: stream.key.clone(),
                    body,
                });
            }
        }

        Ok(deliveries)
    }
}

#[async_trait]
impl EventStream for RedisStreamTransport {
    async fn poll(&self) -> AppResult<Vec<DeliveredEvent>> {
        if self.pending_sweep_due().await {
            let pending = self.read_group(PENDING_ENTRIES_ID, false).await?;
            if !pending.is_empty() {
                warn!(count = pending.len(), "redelivering unacknowledged events");
                return Ok(pending);
            }
        }

        self.read_group(NEW_ENTRIES_ID, true).await
    }

    async fn acknowledge(&self, event: &DeliveredEvent) -> AppResult<()> {
        let mut connection = self.connection.clone();
        let _: i64 = connection
            .xack(
                event.topic.as_str(),
                self.settings.group.as_str(),
                &[event.delivery_id.as_str()],
            )
            .await
            .map_err(|error| {
                AppError::Unavailable(format!(
                    "failed to acknowledge event '{}' on stream '{}': {error}",
                    event.delivery_id, event.topic
                ))
            })?;

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RedisStreamTransport {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> AppResult<()> {
        let body = envelope.to_json()?;
        let mut connection = self.connection.clone();
        let entry_id: String = connection
            .xadd(topic, "*", &[(ENVELOPE_FIELD, body.as_str())])
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to publish to stream '{topic}': {error}"))
            })?;

        debug!(topic, entry_id = %entry_id, "published event");
        Ok(())
    }
}
