use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{BusError, BusMessage, EventBus, Result, partition_for};

/// Default number of partitions per topic.
pub const DEFAULT_PARTITIONS: u32 = 8;

#[derive(Debug, Default)]
struct InMemoryBusState {
    /// topic -> partition -> messages, indexed by offset.
    logs: HashMap<String, Vec<Vec<BusMessage>>>,
    /// (group, topic, partition) -> next offset to deliver.
    committed: HashMap<(String, String, u32), i64>,
    fail_on_publish: bool,
}

/// In-memory event bus for tests and single-process runs.
///
/// Cloning shares the underlying log, so a publisher and its consumers can
/// hold separate handles.
#[derive(Debug, Clone)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<InMemoryBusState>>,
    partitions: u32,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }
}

impl InMemoryEventBus {
    /// Creates a new empty bus with the default partition count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty bus with `partitions` partitions per topic.
    pub fn with_partitions(partitions: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryBusState::default())),
            partitions: partitions.max(1),
        }
    }

    /// Configures the bus to reject every publish until reset.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    /// Returns every message on `topic`, ordered by partition then offset.
    pub async fn messages(&self, topic: &str) -> Vec<BusMessage> {
        self.state
            .read()
            .await
            .logs
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of messages on `topic`.
    pub async fn message_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .logs
            .get(topic)
            .map(|partitions| partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Returns the next offset `group` will read from a partition, if it has
    /// committed anything there.
    pub async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Option<i64> {
        self.state
            .read()
            .await
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<BusMessage> {
        let mut state = self.state.write().await;

        if state.fail_on_publish {
            return Err(BusError::Publish {
                topic: topic.to_string(),
                reason: "broker rejected the message".to_string(),
            });
        }

        let partition = partition_for(key, self.partitions);
        let log = state
            .logs
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); self.partitions as usize]);
        let messages = &mut log[partition as usize];

        let message = BusMessage {
            topic: topic.to_string(),
            partition,
            offset: messages.len() as i64,
            key: key.to_string(),
            payload,
            published_at: Utc::now(),
        };
        messages.push(message.clone());

        metrics::counter!("bus_messages_published_total", "topic" => topic.to_string())
            .increment(1);
        Ok(message)
    }

    async fn poll(
        &self,
        topic: &str,
        group: &str,
        max_per_partition: usize,
    ) -> Result<Vec<BusMessage>> {
        let state = self.state.read().await;
        let Some(log) = state.logs.get(topic) else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::new();
        for (partition, messages) in log.iter().enumerate() {
            let next = state
                .committed
                .get(&(group.to_string(), topic.to_string(), partition as u32))
                .copied()
                .unwrap_or(0);
            batch.extend(
                messages
                    .iter()
                    .skip(next as usize)
                    .take(max_per_partition)
                    .cloned(),
            );
        }
        Ok(batch)
    }

    async fn commit(&self, group: &str, message: &BusMessage) -> Result<()> {
        let mut state = self.state.write().await;
        let next = state
            .committed
            .entry((group.to_string(), message.topic.clone(), message.partition))
            .or_insert(0);
        *next = (*next).max(message.offset + 1);
        Ok(())
    }
}
