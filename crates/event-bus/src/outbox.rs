//! Transactional outbox: messages written next to the entity they announce,
//! then relayed to the bus.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{BusMessage, EventBus, Result};

/// A message waiting in a service's outbox table.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    /// Creates a new unpublished outbox message.
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            key: key.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Storage side of an outbox.
///
/// Implemented by each service store on its own table; rows are inserted by
/// the store's entity-creating transaction, not through this trait.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns up to `limit` unpublished messages, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Marks a message as published. Marking twice is a no-op.
    async fn mark_published(&self, id: Uuid) -> Result<()>;
}

/// Publishes an outbox message and marks it published.
///
/// If marking fails after a successful publish, the relay publishes the
/// message again later; consumers are idempotent.
pub async fn publish_outbox_message<O, B>(
    outbox: &O,
    bus: &B,
    message: &OutboxMessage,
) -> Result<BusMessage>
where
    O: OutboxStore + ?Sized,
    B: EventBus + ?Sized,
{
    let published = bus
        .publish(&message.topic, &message.key, message.payload.clone())
        .await?;
    outbox.mark_published(message.id).await?;
    Ok(published)
}

/// Relay tuning.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Wait between relay passes.
    pub interval: Duration,
    /// Messages fetched per pass.
    pub batch_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            batch_size: 100,
        }
    }
}

/// Background process publishing whatever the outbox still holds.
pub struct OutboxRelay<O, B> {
    outbox: O,
    bus: B,
    config: RelayConfig,
}

impl<O: OutboxStore, B: EventBus> OutboxRelay<O, B> {
    pub fn new(outbox: O, bus: B, config: RelayConfig) -> Self {
        Self {
            outbox,
            bus,
            config,
        }
    }

    /// Publishes pending messages in creation order.
    ///
    /// Stops at the first publish failure so later messages for the same key
    /// are not published ahead of it. Returns how many were relayed.
    pub async fn relay_pending(&self) -> Result<usize> {
        let pending = self.outbox.pending(self.config.batch_size).await?;
        let mut relayed = 0;

        for message in &pending {
            if let Err(error) = publish_outbox_message(&self.outbox, &self.bus, message).await {
                tracing::warn!(
                    %error,
                    outbox_id = %message.id,
                    topic = %message.topic,
                    key = %message.key,
                    "outbox relay could not publish message, will retry"
                );
                metrics::counter!("outbox_relay_failures_total").increment(1);
                break;
            }
            relayed += 1;
        }

        if relayed > 0 {
            metrics::counter!("outbox_relayed_total").increment(relayed as u64);
            tracing::info!(relayed, "relayed outbox messages");
        }

        Ok(relayed)
    }

    /// Runs relay passes until `shutdown` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("outbox relay started");

        while !*shutdown.borrow() {
            if let Err(error) = self.relay_pending().await {
                tracing::error!(%error, "outbox relay pass failed");
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("outbox relay stopped");
    }
}
