//! Inventory gateway trait and implementations.
//!
//! The order service blocks on this check before any mutation. An error or
//! timeout is never read as "the product exists".

pub mod http;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use thiserror::Error;

pub use http::HttpInventoryGateway;
pub use memory::InMemoryInventoryGateway;

/// Errors that can occur when querying the inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The HTTP request failed or the response could not be decoded.
    #[error("Inventory request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The inventory answered with a non-success status.
    #[error("Inventory responded with status {0}")]
    Status(u16),

    /// The inventory did not answer in time.
    #[error("Inventory did not respond within {0:?}")]
    Timeout(Duration),

    /// The inventory is unavailable.
    #[error("Inventory unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous existence check against the product inventory.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Returns whether `product_id` exists.
    async fn exists(&self, product_id: ProductId) -> Result<bool, InventoryError>;
}

#[async_trait]
impl<T: InventoryGateway + ?Sized> InventoryGateway for Arc<T> {
    async fn exists(&self, product_id: ProductId) -> Result<bool, InventoryError> {
        (**self).exists(product_id).await
    }
}
