//! Order placement and shipment confirmation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{OrderId, OrderShippedEvent, ProductId, Topics};
use event_bus::{BusMessage, EventBus, HandlerError, MessageHandler, publish_outbox_message};

use crate::error::{OrderServiceError, Result};
use crate::inventory::{InventoryError, InventoryGateway};
use crate::order::{NewOrder, Order};
use crate::store::OrderStore;

/// Order service settings.
#[derive(Debug, Clone)]
pub struct OrderServiceConfig {
    /// Topic placement events are published to.
    pub placed_topic: String,
    /// Upper bound on the inventory check.
    pub gateway_timeout: Duration,
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            placed_topic: Topics::default().orders_placed,
            gateway_timeout: Duration::from_secs(2),
        }
    }
}

/// Result of applying a shipment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipOutcome {
    /// The order moved from PLACED to SHIPPED.
    Shipped,
    /// The order was already SHIPPED; nothing changed.
    AlreadyShipped,
    /// No order with that ID exists; the confirmation was dropped.
    Orphaned,
}

/// Owns orders: validates and places them, and applies shipment
/// confirmations coming back from shipping.
pub struct OrderService<S, G, B> {
    store: S,
    inventory: G,
    bus: B,
    config: OrderServiceConfig,
}

impl<S, G, B> OrderService<S, G, B>
where
    S: OrderStore,
    G: InventoryGateway,
    B: EventBus,
{
    pub fn new(store: S, inventory: G, bus: B, config: OrderServiceConfig) -> Self {
        Self {
            store,
            inventory,
            bus,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &OrderServiceConfig {
        &self.config
    }

    /// Places an order for an existing product.
    ///
    /// The inventory is checked first; nothing is written unless it confirms
    /// the product. The order and its placement event are then committed
    /// together and the event is published. A failed publish is left in the
    /// outbox for the relay and does not fail the placement.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(&self, product_id: ProductId, price: f64) -> Result<Order> {
        let new_order = NewOrder::new(product_id, price)?;

        let started = Instant::now();
        let checked = tokio::time::timeout(
            self.config.gateway_timeout,
            self.inventory.exists(product_id),
        )
        .await;
        metrics::histogram!("inventory_check_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let exists = match checked {
            Ok(Ok(exists)) => exists,
            Ok(Err(error)) => return Err(self.gateway_failure(product_id, error)),
            Err(_) => {
                let error = InventoryError::Timeout(self.config.gateway_timeout);
                return Err(self.gateway_failure(product_id, error));
            }
        };

        if !exists {
            tracing::info!(%product_id, "order rejected, unknown product");
            metrics::counter!("orders_rejected_total", "reason" => "product_not_found")
                .increment(1);
            return Err(OrderServiceError::ProductNotFound(product_id));
        }

        let (order, message) = self
            .store
            .create_placed(new_order, &self.config.placed_topic)
            .await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id, %product_id, price, "order placed");

        if let Err(error) = publish_outbox_message(&self.store, &self.bus, &message).await {
            metrics::counter!("orders_publish_failures_total").increment(1);
            tracing::warn!(
                %error,
                order_id = %order.id,
                "placement event not published, left for outbox relay"
            );
        }

        Ok(order)
    }

    /// Returns the order with the given ID.
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.store.get(id).await?)
    }

    /// Marks an order SHIPPED.
    ///
    /// Repeated confirmations leave a shipped order as is. A confirmation for
    /// an order this service does not know is logged and dropped.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_shipment(&self, order_id: OrderId) -> Result<ShipOutcome> {
        if self.store.mark_shipped(order_id).await? {
            metrics::counter!("orders_shipped_total").increment(1);
            tracing::info!(%order_id, "order shipped");
            return Ok(ShipOutcome::Shipped);
        }

        match self.store.get(order_id).await? {
            Some(_) => {
                tracing::debug!(%order_id, "duplicate shipment confirmation");
                Ok(ShipOutcome::AlreadyShipped)
            }
            None => {
                metrics::counter!("orders_orphan_confirmations_total").increment(1);
                tracing::warn!(%order_id, "shipment confirmation for unknown order");
                Ok(ShipOutcome::Orphaned)
            }
        }
    }

    /// Decodes an `orders.shipped` payload and applies it.
    pub async fn handle_order_shipped(&self, payload: &[u8]) -> Result<ShipOutcome> {
        let event = OrderShippedEvent::decode(payload)?;
        self.confirm_shipment(event.order_id).await
    }

    fn gateway_failure(&self, product_id: ProductId, error: InventoryError) -> OrderServiceError {
        metrics::counter!("orders_rejected_total", "reason" => "inventory_unavailable")
            .increment(1);
        tracing::warn!(%error, %product_id, "inventory check failed, order not created");
        OrderServiceError::GatewayUnavailable(error)
    }
}

/// Bus handler applying `orders.shipped` messages to the order service.
pub struct OrderShippedHandler<S, G, B> {
    service: Arc<OrderService<S, G, B>>,
}

impl<S, G, B> OrderShippedHandler<S, G, B> {
    pub fn new(service: Arc<OrderService<S, G, B>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S, G, B> MessageHandler for OrderShippedHandler<S, G, B>
where
    S: OrderStore + 'static,
    G: InventoryGateway + 'static,
    B: EventBus + 'static,
{
    async fn handle(&self, message: &BusMessage) -> std::result::Result<(), HandlerError> {
        self.service.handle_order_shipped(&message.payload).await?;
        Ok(())
    }
}
