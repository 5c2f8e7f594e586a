//! Background tasks running next to the HTTP server.

use std::sync::Arc;

use common::topics::ORDER_GROUP;
use event_bus::{Consumer, EventBus, OutboxRelay};
use order_service::{InventoryGateway, OrderService, OrderShippedHandler, OrderStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;

/// The `orders.shipped` consumer and the outbox relay, stopped together.
pub struct Workers {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Spawns both tasks on the current runtime.
    pub fn spawn<S, G, B>(
        service: Arc<OrderService<S, G, B>>,
        store: S,
        bus: B,
        config: &Config,
    ) -> Self
    where
        S: OrderStore + Clone + 'static,
        G: InventoryGateway + 'static,
        B: EventBus + Clone + 'static,
    {
        let (shutdown, receiver) = watch::channel(false);

        let consumer = Consumer::new(
            bus.clone(),
            OrderShippedHandler::new(service),
            config.topics().orders_shipped,
            ORDER_GROUP,
            config.consumer_config(),
        );
        let relay = OutboxRelay::new(store, bus, config.relay_config());

        let handles = vec![
            tokio::spawn(consumer.run(receiver.clone())),
            tokio::spawn(relay.run(receiver)),
        ];

        Self { shutdown, handles }
    }

    /// Signals shutdown and waits for both tasks to finish their current
    /// message.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(error) = handle.await {
                tracing::error!(%error, "background task ended abnormally");
            }
        }
    }
}
