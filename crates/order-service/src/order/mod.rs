//! Order record and related types.

mod status;

pub use status::OrderStatus;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderPlacedEvent, ProductId};
use thiserror::Error;

/// Errors raised by order validation.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order amount must be a finite number greater than zero.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: f64 },

    /// A stored status value is not recognised.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

/// A validated request to create an order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewOrder {
    pub product_id: ProductId,
    pub price: f64,
}

impl NewOrder {
    /// Validates the order amount.
    pub fn new(product_id: ProductId, price: f64) -> Result<Self, OrderError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(OrderError::InvalidPrice { price });
        }
        Ok(Self { product_id, price })
    }
}

/// An order as persisted by the order store.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub product_id: ProductId,
    pub price: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds the event announcing this order's placement.
    pub fn placed_event(&self) -> OrderPlacedEvent {
        OrderPlacedEvent::new(self.id, self.product_id, self.price)
    }
}
