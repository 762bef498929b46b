// src/broker.rs

//! The narrow slice of the AMQP broker this crate relies on.
//!
//! Dispatcher and worker only ever talk to a [`BrokerChannel`]. The production
//! implementation is `lapin::Channel`; tests substitute an in-memory broker.

use std::fmt;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lapin::{
    acker::Acker,
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    protocol::basic::AMQPProperties,
    types::FieldTable,
    Channel,
};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// AMQP delivery mode that asks the broker to persist the message to disk.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

pub type DeliveryStream = BoxStream<'static, Result<InboundMessage>>;

/// Queue options shared by the dispatcher and the worker. Both sides must
/// declare with identical parameters or the broker rejects the second one.
pub fn durable_queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

pub fn persistent_properties() -> AMQPProperties {
    AMQPProperties::default().with_delivery_mode(PERSISTENT_DELIVERY_MODE)
}

/// Explicit acknowledgment handle for one delivery.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn acknowledge(&self) -> Result<()>;
}

#[async_trait]
impl Acknowledge for Acker {
    async fn acknowledge(&self) -> Result<()> {
        self.ack(BasicAckOptions::default()).await?;
        Ok(())
    }
}

/// A message received from a queue, not yet acknowledged.
pub struct InboundMessage {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub payload: Vec<u8>,
    /// Delivery mode the publisher set, if any. `Some(2)` means persistent.
    pub delivery_mode: Option<u8>,
    acker: Box<dyn Acknowledge>,
}

impl InboundMessage {
    pub fn new(
        delivery_tag: u64,
        redelivered: bool,
        payload: Vec<u8>,
        acker: impl Acknowledge + 'static,
    ) -> Self {
        InboundMessage {
            delivery_tag,
            redelivered,
            payload,
            delivery_mode: None,
            acker: Box::new(acker),
        }
    }

    pub fn with_delivery_mode(mut self, delivery_mode: Option<u8>) -> Self {
        self.delivery_mode = delivery_mode;
        self
    }

    /// Confirms processing to the broker. Consumes the message so it cannot be
    /// acknowledged twice.
    pub async fn ack(self) -> Result<()> {
        self.acker.acknowledge().await
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("payload_len", &self.payload.len())
            .field("delivery_mode", &self.delivery_mode)
            .finish()
    }
}

impl From<Delivery> for InboundMessage {
    fn from(delivery: Delivery) -> Self {
        let delivery_mode = *delivery.properties.delivery_mode();
        InboundMessage::new(
            delivery.delivery_tag,
            delivery.redelivered,
            delivery.data,
            delivery.acker,
        )
        .with_delivery_mode(delivery_mode)
    }
}

/// Broker operations used by the dispatcher and the worker.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declares `queue` as durable. Declaring an existing durable queue is a no-op.
    async fn declare_durable_queue(&self, queue: &str) -> Result<()>;

    /// Publishes `payload` to `queue` through the default exchange, marked
    /// persistent, and waits for the broker to confirm it.
    async fn publish_persistent(&self, queue: &str, payload: &[u8]) -> Result<()>;

    /// Limits unacknowledged deliveries on this channel.
    async fn set_prefetch(&self, prefetch_count: u16) -> Result<()>;

    /// Starts a manual-ack consumer on `queue`.
    async fn subscribe(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream>;
}

#[async_trait]
impl BrokerChannel for Channel {
    async fn declare_durable_queue(&self, queue: &str) -> Result<()> {
        self.queue_declare(queue, durable_queue_options(), FieldTable::default())
        .await
        .map_err(|e| {
            PipelineError::DeliveryError(format!("Failed to declare queue '{}': {}", queue, e))
        })?;
        debug!(queue, "Declared durable queue");
        Ok(())
    }

    async fn publish_persistent(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let confirmation = self
            .basic_publish(
                "", // Default exchange
                queue,
                BasicPublishOptions::default(),
                payload,
                persistent_properties(),
            )
            .await?
            .await?; // Wait for broker ack/nack

        if confirmation.is_nack() {
            return Err(PipelineError::DeliveryError(format!(
                "Broker rejected message for queue '{}'",
                queue
            )));
        }
        Ok(())
    }

    async fn set_prefetch(&self, prefetch_count: u16) -> Result<()> {
        self.basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| PipelineError::DeliveryError(format!("Failed to set QoS: {}", e)))
    }

    async fn subscribe(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream> {
        let consumer = self
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(), // no_ack: false
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                PipelineError::DeliveryError(format!("Failed to start consuming '{}': {}", queue, e))
            })?;

        Ok(consumer
            .map(|delivery| delivery.map(InboundMessage::from).map_err(PipelineError::from))
            .boxed())
    }
}
