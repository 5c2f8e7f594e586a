use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{BusMessage, EventBus, Result, memory::DEFAULT_PARTITIONS, partition_for};

/// PostgreSQL-backed event bus.
///
/// Messages live in `bus_messages`; each consumer group's position per
/// partition lives in `bus_offsets`. The row ID doubles as the offset.
#[derive(Clone)]
pub struct PostgresEventBus {
    pool: PgPool,
    partitions: u32,
}

impl PostgresEventBus {
    /// Creates a new PostgreSQL event bus with the default partition count.
    pub fn new(pool: PgPool) -> Self {
        Self::with_partitions(pool, DEFAULT_PARTITIONS)
    }

    /// Creates a new PostgreSQL event bus with `partitions` partitions per topic.
    pub fn with_partitions(pool: PgPool, partitions: u32) -> Self {
        Self {
            pool,
            partitions: partitions.max(1),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the bus migrations.
    ///
    /// Migrations of other crates sharing the database are tolerated.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await
    }

    fn row_to_message(row: PgRow) -> Result<BusMessage> {
        Ok(BusMessage {
            topic: row.try_get("topic")?,
            partition: row.try_get::<i32, _>("partition")? as u32,
            offset: row.try_get("id")?,
            key: row.try_get("key")?,
            payload: row.try_get("payload")?,
            published_at: row.try_get("published_at")?,
        })
    }
}

#[async_trait]
impl EventBus for PostgresEventBus {
    #[tracing::instrument(skip(self, payload))]
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<BusMessage> {
        let partition = partition_for(key, self.partitions);
        let mut tx = self.pool.begin().await?;

        // Inserts into one partition are serialized so that offset order
        // matches commit order; otherwise a poll could skip past a row whose
        // transaction commits late.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), $2)")
            .bind(topic)
            .bind(partition as i32)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO bus_messages (topic, partition, key, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id, topic, partition, key, payload, published_at
            "#,
        )
        .bind(topic)
        .bind(partition as i32)
        .bind(key)
        .bind(&payload)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        metrics::counter!("bus_messages_published_total", "topic" => topic.to_string())
            .increment(1);
        Self::row_to_message(row)
    }

    async fn poll(
        &self,
        topic: &str,
        group: &str,
        max_per_partition: usize,
    ) -> Result<Vec<BusMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, topic, partition, key, payload, published_at
            FROM (
                SELECT m.id, m.topic, m.partition, m.key, m.payload, m.published_at,
                       ROW_NUMBER() OVER (PARTITION BY m.partition ORDER BY m.id) AS rn
                FROM bus_messages m
                LEFT JOIN bus_offsets o
                    ON o.group_id = $2 AND o.topic = m.topic AND o.partition = m.partition
                WHERE m.topic = $1 AND m.id >= COALESCE(o.next_offset, 0)
            ) ranked
            WHERE rn <= $3
            ORDER BY partition ASC, id ASC
            "#,
        )
        .bind(topic)
        .bind(group)
        .bind(max_per_partition as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn commit(&self, group: &str, message: &BusMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bus_offsets (group_id, topic, partition, next_offset)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_id, topic, partition) DO UPDATE SET
                next_offset = GREATEST(bus_offsets.next_offset, EXCLUDED.next_offset),
                updated_at = NOW()
            "#,
        )
        .bind(group)
        .bind(&message.topic)
        .bind(message.partition as i32)
        .bind(message.offset + 1)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
