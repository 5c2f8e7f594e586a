//! Order service for the order fulfillment choreography.
//!
//! Places orders after an inventory check, announces them on
//! `orders.placed` through a transactional outbox, and marks them SHIPPED
//! when shipping confirms on `orders.shipped`.

pub mod error;
pub mod inventory;
pub mod order;
pub mod service;
pub mod store;

pub use error::{OrderServiceError, Result};
pub use inventory::{
    HttpInventoryGateway, InMemoryInventoryGateway, InventoryError, InventoryGateway,
};
pub use order::{NewOrder, Order, OrderError, OrderStatus};
pub use service::{OrderService, OrderServiceConfig, OrderShippedHandler, ShipOutcome};
pub use store::{InMemoryOrderStore, OrderStore, OrderStoreError, PostgresOrderStore};
