//! AMQP plumbing: topology, publishing and the consume loop
//!
//! Access logs travel through a durable topic exchange, routed by their HTTP
//! status code, into one durable queue consumed with manual acknowledgement.

mod consumer;
mod publisher;

pub use consumer::run_consumer;
pub use publisher::{AmqpPublisher, LogPublisher};

use lapin::options::{BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::info;

use crate::config::AmqpConfig;
use crate::error::Result;

pub async fn connect(config: &AmqpConfig) -> Result<Connection> {
    let conn = Connection::connect(&config.url, ConnectionProperties::default()).await?;
    info!("Connected to AMQP broker");
    Ok(conn)
}

/// Declare the exchange and queue, bind the configured routing keys and set
/// the consumer prefetch on `channel`
pub async fn setup(channel: &Channel, config: &AmqpConfig) -> Result<()> {
    channel
        .exchange_declare(
            &config.exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    for key in &config.bind_keys {
        channel
            .queue_bind(
                &config.queue,
                &config.exchange,
                key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }

    channel
        .basic_qos(config.prefetch, BasicQosOptions::default())
        .await?;

    info!(
        exchange = %config.exchange,
        queue = %config.queue,
        bind_keys = ?config.bind_keys,
        prefetch = config.prefetch,
        "Broker topology ready"
    );
    Ok(())
}
