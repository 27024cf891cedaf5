use async_trait::async_trait;
use custodia_application::EventPublisher;
use custodia_core::AppResult;
use custodia_domain::EventEnvelope;
use tokio::sync::RwLock;

/// Event publisher that records every envelope for assertions.
#[derive(Debug, Default)]
pub(crate) struct InMemoryEventPublisher {
    published: RwLock<Vec<(String, EventEnvelope)>>,
}

impl InMemoryEventPublisher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns every published `(topic, envelope)` pair in publish order.
    pub(crate) async fn published(&self) -> Vec<(String, EventEnvelope)> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> AppResult<()> {
        self.published
            .write()
            .await
            .push((topic.to_owned(), envelope.clone()));
        Ok(())
    }
}
