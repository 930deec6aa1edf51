//! Redis backend: the whole window update runs as one Lua script

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;
use tracing::error;

use super::{window_key, RateLimiter};
use crate::error::{Error, Result};

const SLIDING_WINDOW_SCRIPT: &str = include_str!("sliding_window.lua");

#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    script: Script,
}

impl RedisRateLimiter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(
        &self,
        namespace: &str,
        client_ip: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool> {
        let now = Utc::now()
            .timestamp_nanos_opt()
            .ok_or_else(|| Error::InvalidRecord("system clock out of range".to_string()))?;
        let window_nanos = i64::try_from(window.as_nanos()).unwrap_or(i64::MAX);
        // Two samples may share a nanosecond; the suffix keeps both in the set.
        let member = format!("{}-{:08x}", now, rand::random::<u32>());

        let mut conn = self.conn.clone();
        let triggered: i64 = self
            .script
            .key(window_key(namespace, client_ip))
            .arg(limit)
            .arg(window_nanos)
            .arg(now)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!(namespace, client_ip, error = %e, "rate limit script failed");
                e
            })?;

        Ok(triggered == 1)
    }
}
