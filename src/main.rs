//! Secumon - API access-log security monitor
//!
//! Ingests access logs over HTTP, queues them on an AMQP broker and runs
//! sliding-window detectors against each one:
//! - Brute force: repeated 401 responses for one client
//! - High traffic: request bursts from one client
//!
//! Detections are persisted per client, kind and minute, and served back as
//! alerts through a read-through cache.

mod alerts;
mod broker;
mod cache;
mod config;
mod consumer;
mod db;
mod detector;
mod domain;
mod error;
mod ratelimit;
mod tasks;
mod web;

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cache::{AlertCache, MemoryAlertCache, RedisAlertCache};
use crate::detector::{BruteForceDetector, Detector, DetectorDeps, HighTrafficDetector};
use crate::ratelimit::{MemoryRateLimiter, RateLimiter, RedisRateLimiter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = config::Config::load()?;

    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Secumon...");

    let db = db::Database::new(&config.database).await?;
    db.run_migrations().await?;
    info!("Database initialized");
    let store = Arc::new(db);

    let (limiter, cache): (Arc<dyn RateLimiter>, Arc<dyn AlertCache>) = if config.redis.enabled() {
        let client = redis::Client::open(config.redis.url.as_str())?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        info!("Redis connected, rate limits and alert cache are shared");
        (
            Arc::new(RedisRateLimiter::new(conn.clone())),
            Arc::new(RedisAlertCache::new(conn, config.alerts.cache_ttl())),
        )
    } else {
        info!("Redis disabled, using in-process rate limits and alert cache");
        (
            Arc::new(MemoryRateLimiter::new()),
            Arc::new(MemoryAlertCache::new(config.alerts.cache_ttl())),
        )
    };

    let amqp = broker::connect(&config.amqp).await?;
    let consume_channel = amqp.create_channel().await?;
    broker::setup(&consume_channel, &config.amqp).await?;
    let publish_channel = amqp.create_channel().await?;

    let deps = DetectorDeps {
        limiter,
        store: store.clone(),
        cache: cache.clone(),
        side_effect_timeout: config.alerts.side_effect_timeout(),
    };
    let detectors: Vec<Arc<dyn Detector>> = vec![
        Arc::new(BruteForceDetector::new(deps.clone(), config.detection.brute_force)),
        Arc::new(HighTrafficDetector::new(deps, config.detection.high_traffic)),
    ];
    let consumer = Arc::new(consumer::Consumer::new(detectors, config.detection.dispatch_timeout()));

    let queue = config.amqp.queue.clone();
    tokio::spawn(async move {
        if let Err(e) = broker::run_consumer(consume_channel, &queue, consumer).await {
            error!("Consumer stopped: {}", e);
        }
    });

    let state = Arc::new(web::AppState {
        publisher: Arc::new(broker::AmqpPublisher::new(publish_channel, config.amqp.exchange.clone())),
        alerts: alerts::AlertService::new(store, cache, &config.alerts),
        default_limit: config.alerts.default_limit,
    });

    // Start web server (blocking)
    web::start_server(&config, state).await?;

    Ok(())
}
