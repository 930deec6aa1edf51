//! Consume loop: one task per delivery, outcome mapped onto ack / nack

use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions};
use lapin::types::FieldTable;
use lapin::Channel;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::consumer::{Consumer, Outcome};
use crate::error::Result;

/// Consume `queue` until the channel closes
pub async fn run_consumer(channel: Channel, queue: &str, consumer: Arc<Consumer>) -> Result<()> {
    let tag = format!("secumon-{}", uuid::Uuid::new_v4());
    let mut deliveries = channel
        .basic_consume(queue, &tag, BasicConsumeOptions::default(), FieldTable::default())
        .await?;

    info!(queue, consumer_tag = %tag, "Consumer started");

    while let Some(delivery) = deliveries.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "Delivery stream error");
                continue;
            }
        };

        let consumer = consumer.clone();
        tokio::spawn(async move {
            let outcome = consumer.handle(&delivery.data).await;
            settle(&delivery, outcome).await;
        });
    }

    warn!(queue, "Consumer stream closed");
    Ok(())
}

async fn settle(delivery: &Delivery, outcome: Outcome) {
    let result = match outcome {
        Outcome::Acked => delivery.acker.ack(BasicAckOptions::default()).await,
        // Both drops are final: no requeue, no redelivery
        Outcome::Rejected | Outcome::Malformed => {
            delivery
                .acker
                .nack(BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                })
                .await
        }
    };

    if let Err(e) = result {
        error!(delivery_tag = delivery.delivery_tag, outcome = ?outcome, error = %e, "Failed to settle delivery");
    }
}
