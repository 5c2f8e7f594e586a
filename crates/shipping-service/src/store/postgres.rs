use async_trait::async_trait;
use common::{OrderId, ShipmentId};
use event_bus::{BusError, OutboxMessage, OutboxStore};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{CreateOutcome, Result, ShipmentStore};
use crate::shipment::Shipment;

/// PostgreSQL-backed shipment store.
///
/// `shipments.order_id` is unique; creation relies on it instead of a prior
/// lookup, so redelivered or concurrent placements converge on one row.
#[derive(Clone)]
pub struct PostgresShipmentStore {
    pool: PgPool,
}

impl PostgresShipmentStore {
    /// Creates a new PostgreSQL shipment store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the shipment migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await
    }

    fn row_to_shipment(row: PgRow) -> std::result::Result<Shipment, sqlx::Error> {
        Ok(Shipment {
            id: ShipmentId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            created_at: row.try_get("created_at")?,
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
impl ShipmentStore for PostgresShipmentStore {
    #[tracing::instrument(skip(self))]
    async fn create_for_order(&self, order_id: OrderId, topic: &str) -> Result<CreateOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO shipments (order_id)
            VALUES ($1)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING id, order_id, created_at
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = inserted else {
            tx.rollback().await?;
            let existing = sqlx::query(
                "SELECT id, order_id, created_at FROM shipments WHERE order_id = $1",
            )
            .bind(order_id.as_i64())
            .fetch_one(&self.pool)
            .await?;
            return Ok(CreateOutcome::AlreadyExists(Self::row_to_shipment(existing)?));
        };

        let shipment = Self::row_to_shipment(row)?;
        let event = shipment.shipped_event();
        let message = OutboxMessage::new(topic, event.key(), event.encode());

        sqlx::query(
            r#"
            INSERT INTO shipment_outbox (id, topic, key, payload, created_at)
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

        tracing::debug!(%order_id, shipment_id = %shipment.id, "shipment and outbox message committed");
        Ok(CreateOutcome::Created(shipment, message))
    }

    async fn get_by_order(&self, order_id: OrderId) -> Result<Option<Shipment>> {
        let row = sqlx::query("SELECT id, order_id, created_at FROM shipments WHERE order_id = $1")
            .bind(order_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Self::row_to_shipment).transpose()?)
    }
}

#[async_trait]
impl OutboxStore for PostgresShipmentStore {
    async fn pending(&self, limit: usize) -> event_bus::Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, topic, key, payload, created_at
            FROM shipment_outbox
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
            UPDATE shipment_outbox
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
