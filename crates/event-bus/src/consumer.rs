//! Subscription loop delivering bus messages to a handler.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use common::dead_letter_topic;
use thiserror::Error;
use tokio::sync::watch;

use crate::retry::RetryConfig;
use crate::{BusMessage, EventBus, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by message handlers.
///
/// Only permanent failures count toward `max_delivery_attempts`. A
/// transient failure is retried with backoff for as long as it lasts.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The message itself cannot be processed, e.g. it does not decode.
    #[error("permanent handler failure: {0}")]
    Permanent(#[source] BoxError),

    /// A dependency of the handler failed, e.g. its store is unreachable.
    #[error("transient handler failure: {0}")]
    Transient(#[source] BoxError),
}

impl HandlerError {
    pub fn permanent(error: impl Into<BoxError>) -> Self {
        Self::Permanent(error.into())
    }

    pub fn transient(error: impl Into<BoxError>) -> Self {
        Self::Transient(error.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Processes messages delivered by a [`Consumer`].
///
/// Returning `Ok` acknowledges the message. Returning `Err` leaves it
/// uncommitted so it is delivered again.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &BusMessage) -> std::result::Result<(), HandlerError>;
}

/// Consumer tuning.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Messages fetched per partition per poll.
    pub batch_size: usize,
    /// Wait between polls when nothing was delivered.
    pub poll_interval: Duration,
    /// Failed deliveries after which a message is dead-lettered.
    pub max_delivery_attempts: u32,
    /// Backoff after failed deliveries or bus errors.
    pub retry: RetryConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_millis(200),
            max_delivery_attempts: 5,
            retry: RetryConfig::default(),
        }
    }
}

/// Counts from a single poll round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub handled: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

impl PollSummary {
    /// Returns true if the round delivered nothing.
    pub fn is_idle(&self) -> bool {
        self.handled == 0 && self.failed == 0 && self.dead_lettered == 0
    }
}

enum Delivery {
    Handled,
    Failed,
    DeadLettered,
}

/// Delivers messages of one topic to a handler on behalf of a consumer group.
///
/// Messages of a partition are handled strictly in offset order: after a
/// failure the rest of that partition waits for the next round. A message
/// failing permanently `max_delivery_attempts` times is copied to
/// `<topic>.dlq` and committed so the partition can move on. Transient
/// failures never dead-letter a message.
pub struct Consumer<B, H> {
    bus: B,
    handler: H,
    topic: String,
    group: String,
    dead_letter_topic: String,
    config: ConsumerConfig,
    attempts: HashMap<(u32, i64), u32>,
    consecutive_failures: u32,
}

impl<B: EventBus, H: MessageHandler> Consumer<B, H> {
    /// Creates a consumer for `topic` in consumer group `group`.
    pub fn new(
        bus: B,
        handler: H,
        topic: impl Into<String>,
        group: impl Into<String>,
        config: ConsumerConfig,
    ) -> Self {
        let topic = topic.into();
        Self {
            bus,
            handler,
            dead_letter_topic: dead_letter_topic(&topic),
            topic,
            group: group.into(),
            config,
            attempts: HashMap::new(),
            consecutive_failures: 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Polls once and delivers every eligible message.
    pub async fn poll_once(&mut self) -> Result<PollSummary> {
        let batch = self
            .bus
            .poll(&self.topic, &self.group, self.config.batch_size)
            .await?;

        // Anything not redelivered was committed elsewhere.
        let pending: HashSet<(u32, i64)> = batch.iter().map(|m| (m.partition, m.offset)).collect();
        self.attempts.retain(|key, _| pending.contains(key));

        let mut summary = PollSummary::default();
        let mut blocked = HashSet::new();

        for message in &batch {
            if blocked.contains(&message.partition) {
                continue;
            }
            match self.deliver(message).await? {
                Delivery::Handled => summary.handled += 1,
                Delivery::DeadLettered => summary.dead_lettered += 1,
                Delivery::Failed => {
                    summary.failed += 1;
                    blocked.insert(message.partition);
                }
            }
        }

        Ok(summary)
    }

    #[tracing::instrument(
        skip(self, message),
        fields(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            key = %message.key
        )
    )]
    async fn deliver(&mut self, message: &BusMessage) -> Result<Delivery> {
        let position = (message.partition, message.offset);

        match self.handler.handle(message).await {
            Ok(()) => {
                self.bus.commit(&self.group, message).await?;
                self.attempts.remove(&position);
                metrics::counter!("bus_messages_handled_total", "topic" => self.topic.clone())
                    .increment(1);
                Ok(Delivery::Handled)
            }
            Err(error) if error.is_transient() => {
                metrics::counter!(
                    "bus_handler_failures_total",
                    "topic" => self.topic.clone(),
                    "kind" => "transient"
                )
                .increment(1);
                tracing::warn!(%error, "handler failed transiently, message will be redelivered");
                Ok(Delivery::Failed)
            }
            Err(error) => {
                let attempts = self.attempts.entry(position).or_insert(0);
                *attempts += 1;
                let attempts = *attempts;

                metrics::counter!(
                    "bus_handler_failures_total",
                    "topic" => self.topic.clone(),
                    "kind" => "permanent"
                )
                .increment(1);

                if attempts < self.config.max_delivery_attempts {
                    tracing::warn!(%error, attempts, "handler failed, message will be redelivered");
                    return Ok(Delivery::Failed);
                }

                tracing::error!(
                    %error,
                    attempts,
                    payload = %message.payload_str(),
                    dead_letter_topic = %self.dead_letter_topic,
                    "handler failed too many times, dead-lettering message"
                );
                self.bus
                    .publish(&self.dead_letter_topic, &message.key, message.payload.clone())
                    .await?;
                self.bus.commit(&self.group, message).await?;
                self.attempts.remove(&position);
                metrics::counter!("bus_dead_lettered_total", "topic" => self.topic.clone())
                    .increment(1);
                Ok(Delivery::DeadLettered)
            }
        }
    }

    /// Runs the subscription loop until `shutdown` turns true or its sender
    /// is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(topic = %self.topic, group = %self.group, "consumer started");

        while !*shutdown.borrow() {
            let delay = match self.poll_once().await {
                Ok(summary) if summary.failed > 0 => {
                    self.consecutive_failures += 1;
                    self.config.retry.delay_for(self.consecutive_failures)
                }
                Ok(summary) => {
                    self.consecutive_failures = 0;
                    if summary.is_idle() {
                        self.config.poll_interval
                    } else {
                        Duration::ZERO
                    }
                }
                Err(error) => {
                    self.consecutive_failures += 1;
                    tracing::error!(%error, topic = %self.topic, "poll failed");
                    self.config.retry.delay_for(self.consecutive_failures)
                }
            };

            if delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(topic = %self.topic, group = %self.group, "consumer stopped");
    }
}
