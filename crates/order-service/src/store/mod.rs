//! Order persistence.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use common::{EventCodecError, OrderId};
use event_bus::{OutboxMessage, OutboxStore};
use thiserror::Error;

use crate::order::{NewOrder, Order};

pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The placement event could not be encoded.
    #[error("Event encoding error: {0}")]
    Codec(#[from] EventCodecError),

    /// A stored row could not be mapped to an order.
    #[error("Invalid order row: {0}")]
    InvalidRow(String),

    /// The store refused the write.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),
}

impl OrderStoreError {
    /// Returns true for failures of the database itself rather than of the
    /// data it holds.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrderStoreError::Database(_) | OrderStoreError::Unavailable(_))
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;

/// Order table plus the outbox its placement events are written to.
#[async_trait]
pub trait OrderStore: OutboxStore {
    /// Inserts a PLACED order and its `orders.placed` outbox message
    /// atomically. The store assigns the order ID.
    async fn create_placed(&self, order: NewOrder, topic: &str) -> Result<(Order, OutboxMessage)>;

    /// Looks an order up by ID.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Moves a PLACED order to SHIPPED.
    ///
    /// Returns `false` when the order does not exist or has already shipped,
    /// leaving it untouched. No other transition is possible, so a shipped
    /// order never returns to PLACED.
    async fn mark_shipped(&self, id: OrderId) -> Result<bool>;
}
