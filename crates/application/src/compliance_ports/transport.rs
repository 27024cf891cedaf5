use async_trait::async_trait;
use custodia_core::AppResult;
use custodia_domain::EventEnvelope;

/// One raw message handed out by the stream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredEvent {
    /// Transport-specific delivery identifier used for acknowledgement.
    pub delivery_id: String,
    /// Topic the message was read from.
    pub topic: String,
    /// Raw JSON body. Empty when the message carried none.
    pub body: String,
}

/// At-least-once source of lifecycle events.
///
/// Unacknowledged deliveries are handed out again later.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Waits for the next batch of deliveries. An empty batch is not an error.
    async fn poll(&self) -> AppResult<Vec<DeliveredEvent>>;

    /// Confirms a delivery so it is never handed out again.
    async fn acknowledge(&self, event: &DeliveredEvent) -> AppResult<()>;
}

/// Outbound event sink.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one envelope on a topic.
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> AppResult<()>;
}
