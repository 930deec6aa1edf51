//! In-process backend for single-node deployments and tests
//!
//! The map entry guard serializes checks for one key the same way the Redis
//! script does; different keys never contend. Keys whose newest sample has
//! left its window are swept at most once per `SWEEP_INTERVAL`, standing in
//! for the key expiry the Redis backend gets from PEXPIRE.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{window_key, RateLimiter};
use crate::error::Result;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Samples of one key together with the window they were checked against
struct Window {
    span: Duration,
    samples: VecDeque<Instant>,
}

impl Window {
    fn is_idle(&self, now: Instant) -> bool {
        self.samples
            .back()
            .map_or(true, |newest| now.duration_since(*newest) >= self.span)
    }
}

pub struct MemoryRateLimiter {
    windows: DashMap<String, Window>,
    last_sweep: Mutex<Instant>,
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self {
            windows: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop idle keys if the last sweep is older than `SWEEP_INTERVAL`.
    /// Must not run while an entry guard is held.
    fn maybe_sweep(&self, now: Instant) {
        {
            let Ok(mut last) = self.last_sweep.lock() else {
                return;
            };
            if now.duration_since(*last) < SWEEP_INTERVAL {
                return;
            }
            *last = now;
        }

        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_idle(now));
        debug!(evicted = before.saturating_sub(self.windows.len()), "rate limit sweep");
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(
        &self,
        namespace: &str,
        client_ip: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool> {
        let now = Instant::now();
        self.maybe_sweep(now);

        let mut entry = self
            .windows
            .entry(window_key(namespace, client_ip))
            .or_insert_with(|| Window {
                span: window,
                samples: VecDeque::new(),
            });
        entry.span = window;

        while let Some(oldest) = entry.samples.front() {
            if now.duration_since(*oldest) >= window {
                entry.samples.pop_front();
            } else {
                break;
            }
        }
        entry.samples.push_back(now);

        Ok(entry.samples.len() >= limit as usize)
    }
}
