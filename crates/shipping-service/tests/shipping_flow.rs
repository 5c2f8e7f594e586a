//! Shipping service behaviour against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, OrderPlacedEvent, OrderShippedEvent, ProductId, Topics};
use event_bus::{
    Consumer, ConsumerConfig, EventBus, InMemoryEventBus, OutboxRelay, RelayConfig, RetryConfig,
};
use shipping_service::{
    InMemoryShipmentStore, OrderPlacedHandler, PlacementOutcome, ShipmentStore,
    ShippingService, ShippingServiceError,
};

type TestService = ShippingService<InMemoryShipmentStore, InMemoryEventBus>;

fn setup() -> (Arc<TestService>, InMemoryShipmentStore, InMemoryEventBus, Topics) {
    let store = InMemoryShipmentStore::new();
    let bus = InMemoryEventBus::new();
    let topics = Topics::default();
    let service = ShippingService::new(store.clone(), bus.clone(), topics.orders_shipped.clone());
    (Arc::new(service), store, bus, topics)
}

fn placed(order_id: i64) -> Vec<u8> {
    OrderPlacedEvent::new(OrderId::new(order_id), ProductId::new(3), 1.0)
        .encode()
        .unwrap()
}

#[tokio::test]
async fn placement_creates_shipment_and_confirms() {
    let (service, store, bus, topics) = setup();

    let outcome = service.handle_order_placed(&placed(7)).await.unwrap();

    let PlacementOutcome::Created(shipment) = outcome else {
        panic!("expected a new shipment");
    };
    assert_eq!(shipment.order_id, OrderId::new(7));

    let messages = bus.messages(&topics.orders_shipped).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].key, "7");
    assert_eq!(messages[0].payload, b"7".to_vec());
    assert_eq!(
        OrderShippedEvent::decode(&messages[0].payload).unwrap(),
        OrderShippedEvent::new(OrderId::new(7))
    );
    assert_eq!(store.pending_count().await, 0);
}

#[tokio::test]
async fn duplicate_placement_creates_one_shipment() {
    let (service, store, bus, topics) = setup();

    let first = service.handle_order_placed(&placed(7)).await.unwrap();
    let second = service.handle_order_placed(&placed(7)).await.unwrap();

    assert!(matches!(first, PlacementOutcome::Created(_)));
    assert_eq!(second, PlacementOutcome::Duplicate(first.shipment().clone()));
    assert_eq!(store.shipment_count().await, 1);
    assert_eq!(bus.message_count(&topics.orders_shipped).await, 1);
}

#[tokio::test]
async fn publish_failure_is_recovered_by_relay() {
    let (service, store, bus, topics) = setup();
    bus.set_fail_on_publish(true).await;

    let outcome = service.handle_order_placed(&placed(7)).await.unwrap();
    assert!(matches!(outcome, PlacementOutcome::Created(_)));
    assert_eq!(store.pending_count().await, 1);

    // Redelivery of the placement does not publish a second confirmation.
    bus.set_fail_on_publish(false).await;
    service.handle_order_placed(&placed(7)).await.unwrap();
    assert_eq!(bus.message_count(&topics.orders_shipped).await, 0);

    let relay = OutboxRelay::new(store.clone(), bus.clone(), RelayConfig::default());
    assert_eq!(relay.relay_pending().await.unwrap(), 1);
    assert_eq!(bus.message_count(&topics.orders_shipped).await, 1);
    assert_eq!(store.pending_count().await, 0);
}

#[tokio::test]
async fn store_failure_is_an_error() {
    let (service, store, bus, topics) = setup();
    store.set_fail_on_write(true).await;

    let result = service.handle_order_placed(&placed(7)).await;

    assert!(matches!(result, Err(ShippingServiceError::Store(_))));
    assert_eq!(bus.message_count(&topics.orders_shipped).await, 0);
}

#[tokio::test]
async fn malformed_placement_is_an_error() {
    let (service, store, _, _) = setup();

    let result = service.handle_order_placed(b"{\"orderId\":").await;

    assert!(matches!(result, Err(ShippingServiceError::MalformedEvent(_))));
    assert_eq!(store.shipment_count().await, 0);
}

#[tokio::test]
async fn placement_with_unknown_fields_is_accepted() {
    let (service, _, _, _) = setup();

    let payload = br#"{"orderId":8,"productId":3,"price":1.0,"currency":"EUR"}"#;
    let outcome = service.handle_order_placed(payload).await.unwrap();

    assert_eq!(outcome.shipment().order_id, OrderId::new(8));
}

#[tokio::test]
async fn consumer_redelivery_is_idempotent() {
    let (service, store, bus, topics) = setup();
    bus.publish(&topics.orders_placed, "7", placed(7)).await.unwrap();
    bus.publish(&topics.orders_placed, "7", placed(7)).await.unwrap();
    bus.publish(&topics.orders_placed, "8", placed(8)).await.unwrap();

    let mut consumer = Consumer::new(
        bus.clone(),
        OrderPlacedHandler::new(service.clone()),
        topics.orders_placed.clone(),
        common::topics::SHIPPING_GROUP,
        ConsumerConfig::default(),
    );
    let summary = consumer.poll_once().await.unwrap();

    assert_eq!(summary.handled, 3);
    assert_eq!(store.shipment_count().await, 2);
    assert!(store.get_by_order(OrderId::new(7)).await.unwrap().is_some());
    assert!(service.get_shipment(OrderId::new(8)).await.unwrap().is_some());
    assert_eq!(bus.message_count(&topics.orders_shipped).await, 2);
    assert!(consumer.poll_once().await.unwrap().is_idle());
}

#[tokio::test]
async fn store_outage_longer_than_attempt_limit_does_not_lose_placement() {
    let (service, store, bus, topics) = setup();
    bus.publish(&topics.orders_placed, "7", placed(7)).await.unwrap();
    store.set_fail_on_write(true).await;

    let mut consumer = Consumer::new(
        bus.clone(),
        OrderPlacedHandler::new(service.clone()),
        topics.orders_placed.clone(),
        common::topics::SHIPPING_GROUP,
        ConsumerConfig {
            max_delivery_attempts: 2,
            ..ConsumerConfig::default()
        },
    );

    for _ in 0..6 {
        let summary = consumer.poll_once().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.dead_lettered, 0);
    }

    store.set_fail_on_write(false).await;
    assert_eq!(consumer.poll_once().await.unwrap().handled, 1);

    let dlq = common::dead_letter_topic(&topics.orders_placed);
    assert_eq!(bus.message_count(&dlq).await, 0);
    assert!(store.get_by_order(OrderId::new(7)).await.unwrap().is_some());
    let shipped = bus.messages(&topics.orders_shipped).await;
    assert_eq!(shipped.len(), 1);
    assert_eq!(
        OrderShippedEvent::decode(&shipped[0].payload).unwrap().order_id,
        OrderId::new(7)
    );
}

#[tokio::test]
async fn running_consumer_resumes_after_store_outage() {
    let (service, store, bus, topics) = setup();
    bus.publish(&topics.orders_placed, "7", placed(7)).await.unwrap();
    store.set_fail_on_write(true).await;

    let consumer = Consumer::new(
        bus.clone(),
        OrderPlacedHandler::new(service.clone()),
        topics.orders_placed.clone(),
        common::topics::SHIPPING_GROUP,
        ConsumerConfig {
            max_delivery_attempts: 2,
            poll_interval: Duration::from_millis(5),
            retry: RetryConfig {
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
            },
            ..ConsumerConfig::default()
        },
    );
    let (shutdown, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(consumer.run(rx));

    // Many times the attempt limit at the configured backoff.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.shipment_count().await, 0);
    store.set_fail_on_write(false).await;

    let recovered = tokio::time::timeout(Duration::from_secs(5), async {
        while store.shipment_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    shutdown.send(true).unwrap();
    task.await.unwrap();

    assert!(recovered.is_ok(), "placement was not applied after the outage");
    let dlq = common::dead_letter_topic(&topics.orders_placed);
    assert_eq!(bus.message_count(&dlq).await, 0);
}
