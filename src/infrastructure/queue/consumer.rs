//! Product consumer
//!
//! Prefetch is 1: a delivery is acked only after the handler succeeds, and
//! nacked with requeue otherwise, so nothing is lost if the process dies
//! mid-message.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::product::Product;
use crate::infrastructure::metrics::{ConsumerMetrics, message_status};
use crate::infrastructure::queue::{QueueError, declare_queue};

const CONSUMER_TAG: &str = "pc-scraper-consumer";

/// Business logic applied to each decoded product.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, product: Product) -> anyhow::Result<()>;
}

/// What to tell the broker about a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Negative-acknowledge and put the message back on the queue.
    Requeue { reason: String },
}

/// Decode `body` and run `handler` on it.
pub async fn process_delivery<H>(handler: &H, body: &[u8]) -> Disposition
where
    H: MessageHandler + ?Sized,
{
    let product: Product = match serde_json::from_slice(body) {
        Ok(product) => product,
        Err(e) => {
            return Disposition::Requeue {
                reason: QueueError::Deserialize(e).to_string(),
            };
        }
    };

    match handler.handle(product).await {
        Ok(()) => Disposition::Ack,
        Err(e) => Disposition::Requeue {
            reason: QueueError::Handler(format!("{e:#}")).to_string(),
        },
    }
}

pub struct AmqpConsumer {
    connection: Connection,
    channel: Channel,
    queue: String,
    metrics: Arc<ConsumerMetrics>,
}

impl AmqpConsumer {
    pub async fn connect(url: &str, queue: &str, metrics: Arc<ConsumerMetrics>) -> Result<Self, QueueError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(QueueError::Connect)?;
        let channel = connection.create_channel().await.map_err(QueueError::Connect)?;

        let declared = declare_queue(&channel, queue).await?;
        metrics.queue_depth.set(u64::from(declared.message_count()));

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(QueueError::Consume)?;

        info!(
            "📥 Consumer connected, queue '{}' ({} messages waiting)",
            queue,
            declared.message_count()
        );
        Ok(Self {
            connection,
            channel,
            queue: queue.to_string(),
            metrics,
        })
    }

    /// Consume until `cancel` fires (returns `Ok`) or the broker fails (returns `Err`).
    pub async fn run<H>(&self, handler: &H, cancel: &CancellationToken) -> Result<(), QueueError>
    where
        H: MessageHandler + ?Sized,
    {
        let mut deliveries = self
            .channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(QueueError::Consume)?;

        info!("Waiting for messages on '{}'", self.queue);

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => {
                    info!("Consumer shutting down");
                    return Ok(());
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => self.dispatch(handler, delivery).await?,
                Some(Err(e)) => return Err(QueueError::Consume(e)),
                None => return Err(QueueError::StreamClosed),
            }
        }
    }

    async fn dispatch<H>(&self, handler: &H, delivery: Delivery) -> Result<(), QueueError>
    where
        H: MessageHandler + ?Sized,
    {
        let started = Instant::now();
        let disposition = process_delivery(handler, &delivery.data).await;
        self.metrics.processing_duration.observe(started.elapsed());

        match disposition {
            Disposition::Ack => {
                self.metrics.messages_processed.inc(&[message_status::SUCCESS]);
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .map_err(QueueError::Consume)?;
            }
            Disposition::Requeue { reason } => {
                error!("❌ Message processing failed, requeueing: {}", reason);
                self.metrics.messages_processed.inc(&[message_status::ERROR]);
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..BasicNackOptions::default()
                    })
                    .await
                    .map_err(QueueError::Consume)?;
            }
        }
        Ok(())
    }

    pub async fn close(self) {
        if let Err(e) = self.channel.close(200, "consumer done").await {
            warn!("Failed to close consumer channel: {}", e);
        }
        if let Err(e) = self.connection.close(200, "consumer done").await {
            warn!("Failed to close consumer connection: {}", e);
        }
    }
}
