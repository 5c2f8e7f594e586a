//! In-memory inventory gateway.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use tokio::sync::RwLock;

use super::{InventoryError, InventoryGateway};

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: HashSet<ProductId>,
    fail: bool,
    delay: Option<Duration>,
    calls: usize,
}

/// In-memory inventory for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryGateway {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryGateway {
    /// Creates an inventory with no products.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory holding the given products.
    pub fn with_products(products: impl IntoIterator<Item = ProductId>) -> Self {
        let state = InMemoryInventoryState {
            products: products.into_iter().collect(),
            ..InMemoryInventoryState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn add_product(&self, product_id: ProductId) {
        self.state.write().await.products.insert(product_id);
    }

    /// Configures the inventory to fail every lookup.
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    /// Configures an artificial delay before every answer.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Returns how many lookups were made.
    pub async fn call_count(&self) -> usize {
        self.state.read().await.calls
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventoryGateway {
    async fn exists(&self, product_id: ProductId) -> Result<bool, InventoryError> {
        let delay = {
            let mut state = self.state.write().await;
            state.calls += 1;
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().await;
        if state.fail {
            return Err(InventoryError::Unavailable(
                "inventory service down".to_string(),
            ));
        }
        Ok(state.products.contains(&product_id))
    }
}
