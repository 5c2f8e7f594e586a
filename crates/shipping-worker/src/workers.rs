//! The `orders.placed` consumer and the shipment outbox relay.

use std::sync::Arc;

use common::topics::SHIPPING_GROUP;
use event_bus::{Consumer, EventBus, OutboxRelay};
use shipping_service::{OrderPlacedHandler, ShipmentStore, ShippingService};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;

/// Background tasks of the worker, stopped together.
pub struct Workers {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    pub fn spawn<S, B>(
        service: Arc<ShippingService<S, B>>,
        store: S,
        bus: B,
        config: &Config,
    ) -> Self
    where
        S: ShipmentStore + Clone + 'static,
        B: EventBus + Clone + 'static,
    {
        let (shutdown, receiver) = watch::channel(false);

        let consumer = Consumer::new(
            bus.clone(),
            OrderPlacedHandler::new(service),
            config.topics().orders_placed,
            SHIPPING_GROUP,
            config.consumer_config(),
        );
        let relay = OutboxRelay::new(store, bus, config.relay_config());

        let handles = vec![
            tokio::spawn(consumer.run(receiver.clone())),
            tokio::spawn(relay.run(receiver)),
        ];

        Self { shutdown, handles }
    }

    /// Signals shutdown and waits for the tasks to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(error) = handle.await {
                tracing::error!(%error, "background task ended abnormally");
            }
        }
    }
}
