use async_trait::async_trait;
use common::{OrderId, ProductId};
use event_bus::{BusError, OutboxMessage, OutboxStore};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{OrderStore, OrderStoreError, Result};
use crate::order::{NewOrder, Order, OrderStatus};

/// PostgreSQL-backed order store.
///
/// Orders live in `orders`; their placement events are written to
/// `order_outbox` in the same transaction.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the order migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            price: row.try_get("price")?,
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| OrderStoreError::InvalidRow(e.to_string()))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_outbox(row: PgRow) -> std::result::Result<OutboxMessage, sqlx::Error> {
        Ok(OutboxMessage {
            id: row.try_get("id")?,
            topic: row.try_get("topic")?,
            key: row.try_get("key")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self))]
    async fn create_placed(&self, order: NewOrder, topic: &str) -> Result<(Order, OutboxMessage)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (product_id, price, status)
            VALUES ($1, $2, $3)
            RETURNING id, product_id, price, status, created_at, updated_at
            "#,
        )
        .bind(order.product_id.as_i64())
        .bind(order.price)
        .bind(OrderStatus::Placed.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let stored = Self::row_to_order(row)?;

        let event = stored.placed_event();
        let message = OutboxMessage::new(topic, event.key(), event.encode()?);

        sqlx::query(
            r#"
            INSERT INTO order_outbox (id, topic, key, payload, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.id)
        .bind(&message.topic)
        .bind(&message.key)
        .bind(&message.payload)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(order_id = %stored.id, "order and outbox message committed");
        Ok((stored, message))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, price, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn mark_shipped(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_i64())
        .bind(OrderStatus::Placed.as_str())
        .bind(OrderStatus::Shipped.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl OutboxStore for PostgresOrderStore {
    async fn pending(&self, limit: usize) -> event_bus::Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, topic, key, payload, created_at
            FROM order_outbox
            WHERE published_at IS NULL
            ORDER BY seq
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::row_to_outbox(row).map_err(BusError::from))
            .collect()
    }

    async fn mark_published(&self, id: Uuid) -> event_bus::Result<()> {
        sqlx::query(
            r#"
            UPDATE order_outbox
            SET published_at = NOW()
            WHERE id = $1 AND published_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
