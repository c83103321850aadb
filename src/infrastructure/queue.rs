//! Durable product queue over AMQP 0.9.1
//!
//! One JSON-encoded [`Product`](crate::domain::Product) per message on a
//! durable queue behind the default exchange. Delivery is at-least-once:
//! a failed message is requeued, never dead-lettered.

pub mod consumer;
pub mod publisher;

use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Queue};
use thiserror::Error;

pub use consumer::{AmqpConsumer, Disposition, MessageHandler, process_delivery};
pub use publisher::{AmqpPublisher, ProductPublisher, encode_product};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to broker: {0}")]
    Connect(#[source] lapin::Error),

    #[error("Failed to declare queue '{queue}': {source}")]
    Declare {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("Failed to serialize product: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to publish to '{queue}': {source}")]
    Publish {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("Broker rejected message for '{queue}'")]
    Nacked { queue: String },

    #[error("Failed to decode message: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("Message handler failed: {0}")]
    Handler(String),

    #[error("Consumer error: {0}")]
    Consume(#[source] lapin::Error),

    #[error("Delivery stream closed by broker")]
    StreamClosed,
}

/// Declare the durable product queue, returning its current state.
pub(crate) async fn declare_queue(channel: &Channel, name: &str) -> Result<Queue, QueueError> {
    channel
        .queue_declare(
            name,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| QueueError::Declare {
            queue: name.to_string(),
            source,
        })
}
