//! Sliding-window rate limiting against a shared store
//!
//! Every check records one sample for `namespace:client_ip`, prunes samples
//! older than the window and compares the remaining count against the limit.
//! The record-prune-count sequence is a single atomic store operation, so
//! concurrent checks for the same client can never under-count.

mod memory;
mod redis_backend;

pub use memory::MemoryRateLimiter;
pub use redis_backend::RedisRateLimiter;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record one sample and report whether the window now holds at least
    /// `limit` samples. Store failures are errors, never "not triggered".
    async fn check(
        &self,
        namespace: &str,
        client_ip: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool>;
}

pub fn window_key(namespace: &str, client_ip: &str) -> String {
    format!("{}:{}", namespace, client_ip)
}
