//! Order placement and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use common::{OrderId, ProductId};
use event_bus::EventBus;
use order_service::{InventoryGateway, Order, OrderService, OrderStatus, OrderStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, G, B> {
    pub orders: Arc<OrderService<S, G, B>>,
}

// -- Request types --

/// Body of `POST /orders`.
///
/// `quantity` is the order amount; it becomes the order's price.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub quantity: f64,
    pub product_id: ProductId,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub product_id: ProductId,
    pub price: f64,
    pub status: OrderStatus,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            product_id: order.product_id,
            price: order.price,
            status: order.status,
        }
    }
}

// -- Handlers --

/// POST /orders: places an order after the inventory check.
///
/// Responds `201 Created` with an empty body and a `Location` header.
#[tracing::instrument(skip(state))]
pub async fn create<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: OrderStore + 'static,
    G: InventoryGateway + 'static,
    B: EventBus + 'static,
{
    let order = state.orders.place_order(req.product_id, req.quantity).await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/orders/{}", order.id))],
    ))
}

/// GET /orders/{id}: returns the order's current status.
#[tracing::instrument(skip(state))]
pub async fn get<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    G: InventoryGateway + 'static,
    B: EventBus + 'static,
{
    let id = OrderId::new(id);
    let order = state
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {id}")))?;

    Ok(Json(order.into()))
}
