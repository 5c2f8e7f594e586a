//! Wire events exchanged between the order and shipping services.
//!
//! Both services depend on these definitions, so the schema lives in one
//! place. Changes must stay additive: decoding ignores unknown fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OrderId, ProductId};

/// Errors raised while decoding an event payload.
#[derive(Debug, Error)]
pub enum EventCodecError {
    /// The payload is not valid JSON for the expected event.
    #[error("Malformed event payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is not valid UTF-8.
    #[error("Event payload is not valid UTF-8")]
    NotUtf8,

    /// The payload does not contain a valid order ID.
    #[error("Invalid order ID in payload: {0:?}")]
    InvalidOrderId(String),
}

/// Announces that an order was durably placed.
///
/// Published on `orders.placed`, keyed by the order ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedEvent {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub price: f64,
}

impl OrderPlacedEvent {
    pub fn new(order_id: OrderId, product_id: ProductId, price: f64) -> Self {
        Self {
            order_id,
            product_id,
            price,
        }
    }

    /// Returns the partition key for this event.
    pub fn key(&self) -> String {
        self.order_id.partition_key()
    }

    /// Encodes the event as JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EventCodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes an event from JSON bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, EventCodecError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Announces that a shipment was created for an order.
///
/// Published on `orders.shipped`. The payload is the bare order ID
/// (`7`), not a structured envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderShippedEvent {
    pub order_id: OrderId,
}

impl OrderShippedEvent {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id }
    }

    /// Returns the partition key for this event.
    pub fn key(&self) -> String {
        self.order_id.partition_key()
    }

    /// Encodes the event as the plain decimal order ID.
    pub fn encode(&self) -> Vec<u8> {
        self.order_id.to_string().into_bytes()
    }

    /// Decodes an event from a plain or JSON-quoted order ID.
    pub fn decode(payload: &[u8]) -> Result<Self, EventCodecError> {
        let text = std::str::from_utf8(payload).map_err(|_| EventCodecError::NotUtf8)?;
        let trimmed = text.trim();
        let raw = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(trimmed);

        raw.parse::<OrderId>()
            .map(Self::new)
            .map_err(|_| EventCodecError::InvalidOrderId(text.to_string()))
    }
}
