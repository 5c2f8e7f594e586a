//! Event bus for the order fulfillment choreography.
//!
//! This crate provides:
//! - an ordered, partitioned, at-least-once log of named topics
//!   ([`EventBus`]) with in-memory and PostgreSQL backends
//! - a [`Consumer`] loop with redelivery, backoff and a dead-letter path
//! - a transactional outbox relay closing the gap between a store commit and
//!   the corresponding publish

pub mod bus;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod message;
pub mod outbox;
pub mod postgres;
pub mod retry;

pub use bus::EventBus;
pub use consumer::{Consumer, ConsumerConfig, HandlerError, MessageHandler, PollSummary};
pub use error::{BusError, Result};
pub use memory::InMemoryEventBus;
pub use message::{BusMessage, partition_for};
pub use outbox::{OutboxMessage, OutboxRelay, OutboxStore, RelayConfig, publish_outbox_message};
pub use postgres::PostgresEventBus;
pub use retry::RetryConfig;
