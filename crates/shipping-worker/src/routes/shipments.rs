//! Operator lookup of shipments.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use event_bus::EventBus;
use shipping_service::{Shipment, ShipmentStore, ShippingService};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, B> {
    pub shipping: Arc<ShippingService<S, B>>,
}

/// GET /shipments/{orderId}: returns the shipment created for an order.
#[tracing::instrument(skip(state))]
pub async fn get_by_order<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(order_id): Path<i64>,
) -> Result<Json<Shipment>, ApiError>
where
    S: ShipmentStore + 'static,
    B: EventBus + 'static,
{
    let order_id = OrderId::new(order_id);
    state
        .shipping
        .get_shipment(order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No shipment for order {order_id}")))
}
