use chrono::{DateTime, Utc};
use common::{OrderId, OrderShippedEvent, ShipmentId};
use serde::Serialize;

/// A shipment created for exactly one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    /// Builds the confirmation announcing this shipment.
    pub fn shipped_event(&self) -> OrderShippedEvent {
        OrderShippedEvent::new(self.order_id)
    }
}
