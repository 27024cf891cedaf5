use std::sync::Arc;

use custodia_core::AppResult;
use tracing::{debug, warn};

use crate::compliance_ports::EventStream;
use crate::event_dispatcher::{EventDispatcher, EventOutcome};

/// Counts of terminal outcomes in one consumed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Deliveries handed out by the transport.
    pub received: usize,
    /// Events whose side effects were applied.
    pub applied: usize,
    /// Duplicates skipped by the dedup gate.
    pub deduplicated: usize,
    /// Unclassified events.
    pub ignored: usize,
    /// Dropped malformed events.
    pub malformed: usize,
    /// Failed events left for redelivery.
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Applied => self.applied += 1,
            EventOutcome::Deduplicated => self.deduplicated += 1,
            EventOutcome::Ignored => self.ignored += 1,
            EventOutcome::Malformed => self.malformed += 1,
            EventOutcome::Failed => self.failed += 1,
        }
    }
}

/// Pulls batches from the transport and drives each event through the dispatcher.
#[derive(Clone)]
pub struct EventConsumer {
    stream: Arc<dyn EventStream>,
    dispatcher: EventDispatcher,
}

impl EventConsumer {
    /// Creates a consumer over a stream and dispatcher.
    #[must_use]
    pub fn new(stream: Arc<dyn EventStream>, dispatcher: EventDispatcher) -> Self {
        Self { stream, dispatcher }
    }

    /// Consumes one batch, acknowledging every event that did not fail.
    ///
    /// Only a failed poll is returned as an error; per-event failures are
    /// counted and left unacknowledged.
    pub async fn run_batch(&self) -> AppResult<BatchSummary> {
        let deliveries = self.stream.poll().await?;
        let mut summary = BatchSummary {
            received: deliveries.len(),
            ..BatchSummary::default()
        };

        for delivery in &deliveries {
            let outcome = self.dispatcher.dispatch(delivery).await;
            summary.record(outcome);

            if !outcome.should_acknowledge() {
                continue;
            }

            if let Err(error) = self.stream.acknowledge(delivery).await {
                warn!(
                    topic = %delivery.topic,
                    delivery_id = %delivery.delivery_id,
                    error = %error,
                    "failed to acknowledge event, it will be redelivered"
                );
            }
        }

        if summary.received > 0 {
            debug!(
                received = summary.received,
                applied = summary.applied,
                deduplicated = summary.deduplicated,
                ignored = summary.ignored,
                malformed = summary.malformed,
                failed = summary.failed,
                "consumed event batch"
            );
        }

        Ok(summary)
    }
}
