use common::EventCodecError;
use event_bus::HandlerError;
use thiserror::Error;

use crate::store::ShipmentStoreError;

/// Errors returned by the shipping service.
#[derive(Debug, Error)]
pub enum ShippingServiceError {
    /// A consumed event could not be decoded.
    #[error(transparent)]
    MalformedEvent(#[from] EventCodecError),

    /// The shipment store failed.
    #[error("Shipment store error: {0}")]
    Store(#[from] ShipmentStoreError),
}

/// Result type for shipping service operations.
pub type Result<T> = std::result::Result<T, ShippingServiceError>;

impl ShippingServiceError {
    /// Returns true if retrying the same event may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ShippingServiceError::Store(_))
    }
}

impl From<ShippingServiceError> for HandlerError {
    fn from(error: ShippingServiceError) -> Self {
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
    fn store_failures_are_transient() {
        let error = ShippingServiceError::Store(ShipmentStoreError::Unavailable("down".into()));
        assert!(error.is_transient());
        assert!(HandlerError::from(error).is_transient());
    }

    #[test]
    fn malformed_events_are_permanent() {
        let codec = common::OrderPlacedEvent::decode(b"{").unwrap_err();
        let error = ShippingServiceError::from(codec);
        assert!(!error.is_transient());
        assert!(!HandlerError::from(error).is_transient());
    }
}
