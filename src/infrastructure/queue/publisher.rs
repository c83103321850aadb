//! Product publisher

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::product::Product;
use crate::infrastructure::queue::{QueueError, declare_queue};

/// Content type of every product message.
pub const CONTENT_TYPE: &str = "application/json";

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

#[async_trait]
pub trait ProductPublisher: Send + Sync {
    async fn publish(&self, product: &Product) -> Result<(), QueueError>;
}

/// JSON payload of one product message.
pub fn encode_product(product: &Product) -> Result<Vec<u8>, QueueError> {
    serde_json::to_vec(product).map_err(QueueError::Serialize)
}

pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpPublisher {
    pub async fn connect(url: &str, queue: &str) -> Result<Self, QueueError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(QueueError::Connect)?;
        let channel = connection.create_channel().await.map_err(QueueError::Connect)?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(QueueError::Connect)?;
        declare_queue(&channel, queue).await?;

        info!("📨 Publisher connected, queue '{}'", queue);
        Ok(Self {
            connection,
            channel,
            queue: queue.to_string(),
        })
    }

    /// Close the channel, then the connection.
    pub async fn close(self) {
        if let Err(e) = self.channel.close(200, "publisher done").await {
            warn!("Failed to close publisher channel: {}", e);
        }
        if let Err(e) = self.connection.close(200, "publisher done").await {
            warn!("Failed to close publisher connection: {}", e);
        }
    }
}

#[async_trait]
impl ProductPublisher for AmqpPublisher {
    async fn publish(&self, product: &Product) -> Result<(), QueueError> {
        let payload = encode_product(product)?;
        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE.into())
            .with_delivery_mode(PERSISTENT)
            .with_timestamp(u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default())
            .with_message_id(Uuid::new_v4().to_string().into());

        let publish_error = |source| QueueError::Publish {
            queue: self.queue.clone(),
            source,
        };
        let confirmation = self
            .channel
            .basic_publish("", &self.queue, BasicPublishOptions::default(), &payload, properties)
            .await
            .map_err(publish_error)?
            .await
            .map_err(publish_error)?;

        if confirmation.is_nack() {
            return Err(QueueError::Nacked {
                queue: self.queue.clone(),
            });
        }

        debug!(title = %product.title, price = product.price, "Published product");
        Ok(())
    }
}
