use async_trait::async_trait;

use crate::{BusMessage, Result};

/// Core trait for event bus implementations.
///
/// The bus is an ordered, partitioned, at-least-once log of named topics.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Appends a message to the partition selected by `key`.
    ///
    /// Returns once the log has durably accepted the message. Messages
    /// sharing a key are delivered in publish order.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<BusMessage>;

    /// Fetches messages that `group` has not yet committed.
    ///
    /// Returns up to `max_per_partition` messages from each partition, ordered
    /// by partition then offset. A message is returned again by later polls
    /// until the group commits it.
    async fn poll(
        &self,
        topic: &str,
        group: &str,
        max_per_partition: usize,
    ) -> Result<Vec<BusMessage>>;

    /// Acknowledges `message` for `group`.
    ///
    /// Moves the group's position in that partition past the message.
    /// Committing an older message than the current position is a no-op.
    async fn commit(&self, group: &str, message: &BusMessage) -> Result<()>;
}

#[async_trait]
impl<T: EventBus + ?Sized> EventBus for std::sync::Arc<T> {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<BusMessage> {
        (**self).publish(topic, key, payload).await
    }

    async fn poll(
        &self,
        topic: &str,
        group: &str,
        max_per_partition: usize,
    ) -> Result<Vec<BusMessage>> {
        (**self).poll(topic, group, max_per_partition).await
    }

    async fn commit(&self, group: &str, message: &BusMessage) -> Result<()> {
        (**self).commit(group, message).await
    }
}
