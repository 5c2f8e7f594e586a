use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ShipmentId};
use event_bus::{BusError, OutboxMessage, OutboxStore};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CreateOutcome, Result, ShipmentStore, ShipmentStoreError};
use crate::shipment::Shipment;

#[derive(Debug, Default)]
struct InMemoryShipmentState {
    by_order: HashMap<OrderId, Shipment>,
    last_id: i64,
    outbox: Vec<(OutboxMessage, bool)>,
    fail_on_write: bool,
}

/// In-memory shipment store for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShipmentStore {
    state: Arc<RwLock<InMemoryShipmentState>>,
}

impl InMemoryShipmentStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to reject writes.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.state.write().await.fail_on_write = fail;
    }

    /// Returns the number of stored shipments.
    pub async fn shipment_count(&self) -> usize {
        self.state.read().await.by_order.len()
    }

    /// Returns the number of outbox messages not yet published.
    pub async fn pending_count(&self) -> usize {
        self.state
            .read()
            .await
            .outbox
            .iter()
            .filter(|(_, published)| !published)
            .count()
    }
}

#[async_trait]
impl ShipmentStore for InMemoryShipmentStore {
    async fn create_for_order(&self, order_id: OrderId, topic: &str) -> Result<CreateOutcome> {
        let mut state = self.state.write().await;
        if state.fail_on_write {
            return Err(ShipmentStoreError::Unavailable(
                "simulated write failure".to_string(),
            ));
        }

        if let Some(existing) = state.by_order.get(&order_id) {
            return Ok(CreateOutcome::AlreadyExists(existing.clone()));
        }

        state.last_id += 1;
        let shipment = Shipment {
            id: ShipmentId::new(state.last_id),
            order_id,
            created_at: Utc::now(),
        };
        let event = shipment.shipped_event();
        let message = OutboxMessage::new(topic, event.key(), event.encode());

        state.by_order.insert(order_id, shipment.clone());
        state.outbox.push((message.clone(), false));

        Ok(CreateOutcome::Created(shipment, message))
    }

    async fn get_by_order(&self, order_id: OrderId) -> Result<Option<Shipment>> {
        Ok(self.state.read().await.by_order.get(&order_id).cloned())
    }
}

#[async_trait]
impl OutboxStore for InMemoryShipmentStore {
    async fn pending(&self, limit: usize) -> event_bus::Result<Vec<OutboxMessage>> {
        Ok(self
            .state
            .read()
            .await
            .outbox
            .iter()
            .filter(|(_, published)| !published)
            .take(limit)
            .map(|(message, _)| message.clone())
            .collect())
    }

    async fn mark_published(&self, id: Uuid) -> event_bus::Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_write {
            return Err(BusError::outbox(ShipmentStoreError::Unavailable(
                "simulated write failure".to_string(),
            )));
        }
        for (message, published) in state.outbox.iter_mut() {
            if message.id == id {
                *published = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_once_per_order() {
        let store = InMemoryShipmentStore::new();

        let first = store
            .create_for_order(OrderId::new(7), "orders.shipped")
            .await
            .unwrap();
        let second = store
            .create_for_order(OrderId::new(7), "orders.shipped")
            .await
            .unwrap();

        let CreateOutcome::Created(created, message) = first else {
            panic!("expected a new shipment");
        };
        assert_eq!(created.order_id, OrderId::new(7));
        assert_eq!(message.key, "7");
        assert_eq!(message.payload, b"7".to_vec());
        assert_eq!(second, CreateOutcome::AlreadyExists(created));
        assert_eq!(store.shipment_count().await, 1);
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let store = InMemoryShipmentStore::new();
        store.set_fail_on_write(true).await;

        let result = store.create_for_order(OrderId::new(7), "orders.shipped").await;

        assert!(matches!(result, Err(ShipmentStoreError::Unavailable(_))));
        store.set_fail_on_write(false).await;
        assert!(store.get_by_order(OrderId::new(7)).await.unwrap().is_none());
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_one_shipment() {
        let store = InMemoryShipmentStore::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create_for_order(OrderId::new(7), "orders.shipped")
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), CreateOutcome::Created(..)) {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.shipment_count().await, 1);
    }
}
