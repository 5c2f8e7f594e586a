use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::OrderId;
use event_bus::{BusError, OutboxMessage, OutboxStore};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderStore, OrderStoreError, Result};
use crate::order::{NewOrder, Order, OrderStatus};

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: BTreeMap<OrderId, Order>,
    last_id: i64,
    outbox: Vec<(OutboxMessage, bool)>,
    fail_on_write: bool,
}

/// In-memory order store for testing and local runs.
///
/// Order IDs start at 1 and increase by one per placed order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to reject order writes.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.state.write().await.fail_on_write = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
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
impl OrderStore for InMemoryOrderStore {
    async fn create_placed(&self, order: NewOrder, topic: &str) -> Result<(Order, OutboxMessage)> {
        let mut state = self.state.write().await;
        if state.fail_on_write {
            return Err(OrderStoreError::Unavailable(
                "simulated write failure".to_string(),
            ));
        }

        let now = Utc::now();
        let stored = Order {
            id: OrderId::new(state.last_id + 1),
            product_id: order.product_id,
            price: order.price,
            status: OrderStatus::Placed,
            created_at: now,
            updated_at: now,
        };

        let event = stored.placed_event();
        let message = OutboxMessage::new(topic, event.key(), event.encode()?);

        state.last_id += 1;
        state.orders.insert(stored.id, stored.clone());
        state.outbox.push((message.clone(), false));

        Ok((stored, message))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn mark_shipped(&self, id: OrderId) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.fail_on_write {
            return Err(OrderStoreError::Unavailable(
                "simulated write failure".to_string(),
            ));
        }

        match state.orders.get_mut(&id) {
            Some(order) if order.status.can_ship() => {
                order.status = OrderStatus::Shipped;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryOrderStore {
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
            return Err(BusError::outbox(OrderStoreError::Unavailable(
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
    use common::{OrderPlacedEvent, ProductId};

    fn new_order(price: f64) -> NewOrder {
        NewOrder::new(ProductId::new(5), price).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = InMemoryOrderStore::new();

        let (first, _) = store.create_placed(new_order(2.0), "orders.placed").await.unwrap();
        let (second, _) = store.create_placed(new_order(3.0), "orders.placed").await.unwrap();

        assert_eq!(first.id, OrderId::new(1));
        assert_eq!(second.id, OrderId::new(2));
        assert_eq!(first.status, OrderStatus::Placed);
        assert_eq!(store.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_create_writes_outbox_message() {
        let store = InMemoryOrderStore::new();

        let (order, message) = store.create_placed(new_order(2.0), "orders.placed").await.unwrap();

        assert_eq!(message.topic, "orders.placed");
        assert_eq!(message.key, order.id.to_string());
        let event = OrderPlacedEvent::decode(&message.payload).unwrap();
        assert_eq!(event, order.placed_event());

        let pending = store.pending(10).await.unwrap();
        assert_eq!(pending, vec![message]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let store = InMemoryOrderStore::new();
        store.set_fail_on_write(true).await;

        let result = store.create_placed(new_order(2.0), "orders.placed").await;

        assert!(matches!(result, Err(OrderStoreError::Unavailable(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_mark_shipped_applies_once() {
        let store = InMemoryOrderStore::new();
        let (order, _) = store.create_placed(new_order(2.0), "orders.placed").await.unwrap();

        let first = store.mark_shipped(order.id).await.unwrap();
        let second = store.mark_shipped(order.id).await.unwrap();

        assert!(first);
        assert!(!second);
        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Shipped);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn test_mark_shipped_unknown_order() {
        let store = InMemoryOrderStore::new();

        let updated = store.mark_shipped(OrderId::new(42)).await.unwrap();

        assert!(!updated);
        assert!(store.get(OrderId::new(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shipped_order_stays_shipped() {
        let store = InMemoryOrderStore::new();
        let (order, _) = store.create_placed(new_order(2.0), "orders.placed").await.unwrap();
        store.mark_shipped(order.id).await.unwrap();

        for _ in 0..3 {
            assert!(!store.mark_shipped(order.id).await.unwrap());
        }
        let (other, _) = store.create_placed(new_order(3.0), "orders.placed").await.unwrap();

        let shipped = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert!(shipped.status.is_terminal());
        let placed = store.get(other.id).await.unwrap().unwrap();
        assert_eq!(placed.status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn test_mark_published_clears_pending() {
        let store = InMemoryOrderStore::new();
        let (_, message) = store.create_placed(new_order(2.0), "orders.placed").await.unwrap();

        store.mark_published(message.id).await.unwrap();
        store.mark_published(message.id).await.unwrap();

        assert_eq!(store.pending_count().await, 0);
    }
}
