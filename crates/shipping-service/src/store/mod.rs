//! Shipment persistence.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use common::OrderId;
use event_bus::{OutboxMessage, OutboxStore};
use thiserror::Error;

use crate::shipment::Shipment;

pub use memory::InMemoryShipmentStore;
pub use postgres::PostgresShipmentStore;

/// Errors that can occur when interacting with the shipment store.
#[derive(Debug, Error)]
pub enum ShipmentStoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store refused the write.
    #[error("Shipment store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for shipment store operations.
pub type Result<T> = std::result::Result<T, ShipmentStoreError>;

/// Result of asking the store to create a shipment.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A new shipment was created along with its `orders.shipped` outbox
    /// message.
    Created(Shipment, OutboxMessage),
    /// A shipment for the order already existed; nothing was written.
    AlreadyExists(Shipment),
}

/// Shipment table plus the outbox its confirmations are written to.
#[async_trait]
pub trait ShipmentStore: OutboxStore {
    /// Creates the shipment for `order_id` unless one exists.
    ///
    /// The shipment and its confirmation message are written atomically.
    /// Concurrent calls for one order create at most one shipment.
    async fn create_for_order(&self, order_id: OrderId, topic: &str) -> Result<CreateOutcome>;

    /// Looks up the shipment of an order.
    async fn get_by_order(&self, order_id: OrderId) -> Result<Option<Shipment>>;
}
