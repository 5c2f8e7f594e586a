use common::{EventCodecError, ProductId};
use event_bus::HandlerError;
use thiserror::Error;

use crate::inventory::InventoryError;
use crate::order::OrderError;
use crate::store::OrderStoreError;

/// Errors returned by the order service.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The inventory reports that the product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The inventory could not answer; the order was not created.
    #[error("Inventory check failed: {0}")]
    GatewayUnavailable(#[source] InventoryError),

    /// The order request is invalid.
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),

    /// The order store failed.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// A consumed event could not be decoded.
    #[error(transparent)]
    MalformedEvent(#[from] EventCodecError),
}

/// Result type for order service operations.
pub type Result<T> = std::result::Result<T, OrderServiceError>;

impl OrderServiceError {
    /// Returns true if retrying the same request or event may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            OrderServiceError::GatewayUnavailable(_) => true,
            OrderServiceError::Store(error) => error.is_transient(),
            OrderServiceError::ProductNotFound(_)
            | OrderServiceError::InvalidOrder(_)
            | OrderServiceError::MalformedEvent(_) => false,
        }
    }
}

impl From<OrderServiceError> for HandlerError {
    fn from(error: OrderServiceError) -> Self {
        if error.is_transient() {
            HandlerError::transient(error)
        } else {
            HandlerError::permanent(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_outage_is_transient() {
        let error = OrderServiceError::Store(OrderStoreError::Unavailable("down".into()));
        assert!(error.is_transient());
        assert!(HandlerError::from(error).is_transient());
    }

    #[test]
    fn bad_rows_and_payloads_are_permanent() {
        let row = OrderServiceError::Store(OrderStoreError::InvalidRow("status".into()));
        assert!(!row.is_transient());

        let codec = common::OrderShippedEvent::decode(b"x7").unwrap_err();
        let payload = OrderServiceError::from(codec);
        assert!(!payload.is_transient());
        assert!(!HandlerError::from(payload).is_transient());
    }
}
