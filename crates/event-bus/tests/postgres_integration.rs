//! PostgreSQL event bus integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p event-bus --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use event_bus::{EventBus, PostgresEventBus, partition_for};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../migrations/20250101000001_create_bus_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_bus(partitions: u32) -> PostgresEventBus {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE bus_messages, bus_offsets")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventBus::with_partitions(pool, partitions)
}

#[tokio::test]
async fn publish_and_poll() {
    let bus = get_test_bus(4).await;

    let published = bus
        .publish("orders.placed", "7", br#"{"orderId":7}"#.to_vec())
        .await
        .unwrap();
    assert_eq!(published.partition, partition_for("7", 4));

    let batch = bus.poll("orders.placed", "shipping-group", 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].key, "7");
    assert_eq!(batch[0].payload, br#"{"orderId":7}"#.to_vec());
    assert_eq!(batch[0].offset, published.offset);
}

#[tokio::test]
async fn uncommitted_messages_are_redelivered() {
    let bus = get_test_bus(4).await;
    bus.publish("t", "1", b"a".to_vec()).await.unwrap();

    let first = bus.poll("t", "g", 10).await.unwrap();
    let second = bus.poll("t", "g", 10).await.unwrap();
    assert_eq!(first, second);

    bus.commit("g", &first[0]).await.unwrap();
    assert!(bus.poll("t", "g", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn same_key_preserves_publish_order() {
    let bus = get_test_bus(4).await;
    for i in 0..5u8 {
        bus.publish("t", "order-1", vec![i]).await.unwrap();
    }

    let batch = bus.poll("t", "g", 10).await.unwrap();
    let payloads: Vec<u8> = batch.iter().map(|m| m.payload[0]).collect();
    assert_eq!(payloads, vec![0, 1, 2, 3, 4]);
    assert!(batch.windows(2).all(|w| w[0].offset < w[1].offset));
}

#[tokio::test]
async fn poll_limit_applies_per_partition() {
    let bus = get_test_bus(1).await;
    for i in 0..5u8 {
        bus.publish("t", "k", vec![i]).await.unwrap();
    }

    let batch = bus.poll("t", "g", 2).await.unwrap();
    assert_eq!(batch.len(), 2);

    bus.commit("g", &batch[1]).await.unwrap();
    let next = bus.poll("t", "g", 2).await.unwrap();
    assert_eq!(next[0].payload, vec![2]);
}

#[tokio::test]
async fn commit_is_monotonic_and_group_scoped() {
    let bus = get_test_bus(1).await;
    let m0 = bus.publish("t", "k", b"0".to_vec()).await.unwrap();
    let m1 = bus.publish("t", "k", b"1".to_vec()).await.unwrap();

    bus.commit("a", &m1).await.unwrap();
    bus.commit("a", &m0).await.unwrap();

    assert!(bus.poll("t", "a", 10).await.unwrap().is_empty());
    assert_eq!(bus.poll("t", "b", 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn topics_are_isolated() {
    let bus = get_test_bus(2).await;
    bus.publish("orders.placed", "1", b"placed".to_vec())
        .await
        .unwrap();
    bus.publish("orders.shipped", "1", b"1".to_vec())
        .await
        .unwrap();

    let placed = bus.poll("orders.placed", "g", 10).await.unwrap();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].topic, "orders.placed");
}
