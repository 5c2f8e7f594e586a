//! Shipping service for the order fulfillment choreography.
//!
//! Consumes `orders.placed`, creates exactly one shipment per order, and
//! confirms it on `orders.shipped` through a transactional outbox.

pub mod error;
pub mod service;
pub mod shipment;
pub mod store;

pub use error::{Result, ShippingServiceError};
pub use service::{OrderPlacedHandler, PlacementOutcome, ShippingService};
pub use shipment::Shipment;
pub use store::{
    CreateOutcome, InMemoryShipmentStore, PostgresShipmentStore, ShipmentStore,
    ShipmentStoreError,
};
