//! Shipment creation in reaction to placed orders.

use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, OrderPlacedEvent, Topics};
use event_bus::{BusMessage, EventBus, HandlerError, MessageHandler, publish_outbox_message};

use crate::error::Result;
use crate::shipment::Shipment;
use crate::store::{CreateOutcome, ShipmentStore};

/// What handling one placement event did.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    /// A shipment was created and its confirmation announced.
    Created(Shipment),
    /// The order already had a shipment; no new confirmation was produced.
    Duplicate(Shipment),
}

impl PlacementOutcome {
    pub fn shipment(&self) -> &Shipment {
        match self {
            PlacementOutcome::Created(shipment) | PlacementOutcome::Duplicate(shipment) => {
                shipment
            }
        }
    }
}

/// Creates one shipment per placed order and confirms it on
/// `orders.shipped`.
pub struct ShippingService<S, B> {
    store: S,
    bus: B,
    shipped_topic: String,
}

impl<S: ShipmentStore, B: EventBus> ShippingService<S, B> {
    pub fn new(store: S, bus: B, shipped_topic: impl Into<String>) -> Self {
        Self {
            store,
            bus,
            shipped_topic: shipped_topic.into(),
        }
    }

    /// Creates a service publishing to the default `orders.shipped` topic.
    pub fn with_default_topic(store: S, bus: B) -> Self {
        Self::new(store, bus, Topics::default().orders_shipped)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decodes an `orders.placed` payload and ensures its shipment exists.
    ///
    /// A redelivered event finds the existing shipment and publishes
    /// nothing. A failed publish after the shipment commits stays in the
    /// outbox for the relay and does not fail the handling.
    #[tracing::instrument(skip(self, payload))]
    pub async fn handle_order_placed(&self, payload: &[u8]) -> Result<PlacementOutcome> {
        let event = OrderPlacedEvent::decode(payload)?;
        let order_id = event.order_id;

        match self
            .store
            .create_for_order(order_id, &self.shipped_topic)
            .await?
        {
            CreateOutcome::Created(shipment, message) => {
                metrics::counter!("shipments_created_total").increment(1);
                tracing::info!(
                    %order_id,
                    shipment_id = %shipment.id,
                    product_id = %event.product_id,
                    "shipment created"
                );

                if let Err(error) = publish_outbox_message(&self.store, &self.bus, &message).await
                {
                    metrics::counter!("shipments_publish_failures_total").increment(1);
                    tracing::warn!(
                        %error,
                        %order_id,
                        "shipment confirmation not published, left for outbox relay"
                    );
                }

                Ok(PlacementOutcome::Created(shipment))
            }
            CreateOutcome::AlreadyExists(shipment) => {
                metrics::counter!("shipments_duplicate_placements_total").increment(1);
                tracing::debug!(%order_id, "placement already has a shipment");
                Ok(PlacementOutcome::Duplicate(shipment))
            }
        }
    }

    /// Returns the shipment of an order, if one was created.
    pub async fn get_shipment(&self, order_id: OrderId) -> Result<Option<Shipment>> {
        Ok(self.store.get_by_order(order_id).await?)
    }
}

/// Bus handler applying `orders.placed` messages to the shipping service.
pub struct OrderPlacedHandler<S, B> {
    service: Arc<ShippingService<S, B>>,
}

impl<S, B> OrderPlacedHandler<S, B> {
    pub fn new(service: Arc<ShippingService<S, B>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S, B> MessageHandler for OrderPlacedHandler<S, B>
where
    S: ShipmentStore + 'static,
    B: EventBus + 'static,
{
    async fn handle(&self, message: &BusMessage) -> std::result::Result<(), HandlerError> {
        self.service.handle_order_placed(&message.payload).await?;
        Ok(())
    }
}
