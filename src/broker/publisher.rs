use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};

use crate::domain::AccessLogEvent;
use crate::error::Result;

/// Hands an accepted access log to the detection pipeline
#[async_trait]
pub trait LogPublisher: Send + Sync {
    async fn publish(&self, event: &AccessLogEvent) -> Result<()>;
}

/// Publishes JSON access logs keyed by status code over one long-lived channel
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
}

impl AmqpPublisher {
    pub fn new(channel: Channel, exchange: String) -> Self {
        Self { channel, exchange }
    }
}

#[async_trait]
impl LogPublisher for AmqpPublisher {
    async fn publish(&self, event: &AccessLogEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let routing_key = event.status_code.to_string();

        self.channel
            .basic_publish(
                &self.exchange,
                &routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await?
            .await?;
        Ok(())
    }
}
