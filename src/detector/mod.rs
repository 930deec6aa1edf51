//! Attack detectors
//!
//! Each detector wraps the sliding-window rate limiter with its own namespace,
//! threshold and triggering condition. A trigger is persisted synchronously;
//! the alert cache is invalidated afterwards on a detached task whose failure
//! never fails the detection.

mod brute_force;
mod high_traffic;

pub use brute_force::BruteForceDetector;
pub use high_traffic::HighTrafficDetector;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::AlertCache;
use crate::config::RuleConfig;
use crate::db::EventStore;
use crate::domain::{AccessLogEvent, AttackKind, SecurityEvent};
use crate::error::Result;
use crate::ratelimit::RateLimiter;
use crate::tasks::spawn_detached;

#[async_trait]
pub trait Detector: Send + Sync {
    fn kind(&self) -> AttackKind;

    /// Evaluate one access log. A non-attack is `Ok(())`; errors mean the
    /// rate-limit store or the event store could not be reached.
    async fn detect(&self, event: &AccessLogEvent) -> Result<()>;
}

/// Store handles every detector is built from
#[derive(Clone)]
pub struct DetectorDeps {
    pub limiter: Arc<dyn RateLimiter>,
    pub store: Arc<dyn EventStore>,
    pub cache: Arc<dyn AlertCache>,
    /// Timeout of the detached cache invalidation
    pub side_effect_timeout: Duration,
}

/// Trigger path shared by the sliding-window detectors
struct SlidingWindowRule {
    kind: AttackKind,
    rule: RuleConfig,
    details: String,
    deps: DetectorDeps,
}

impl SlidingWindowRule {
    fn new(kind: AttackKind, rule: RuleConfig, details: String, deps: DetectorDeps) -> Self {
        Self { kind, rule, details, deps }
    }

    /// Count the event; `Some` once the client crossed the threshold
    async fn evaluate(&self, event: &AccessLogEvent) -> Result<Option<SecurityEvent>> {
        let triggered = self
            .deps
            .limiter
            .check(self.kind.as_str(), &event.client_ip, self.rule.limit, self.rule.window())
            .await?;

        if !triggered {
            return Ok(None);
        }

        Ok(Some(SecurityEvent {
            kind: self.kind,
            timestamp: Utc::now(),
            client_ip: event.client_ip.clone(),
            details: self.details.clone(),
        }))
    }

    async fn run(&self, event: &AccessLogEvent) -> Result<()> {
        let Some(security_event) = self.evaluate(event).await? else {
            debug!(kind = %self.kind, client_ip = %event.client_ip, "below threshold");
            return Ok(());
        };

        warn!(
            kind = %security_event.kind,
            client_ip = %security_event.client_ip,
            details = %security_event.details,
            "[ALERT] attack detected"
        );

        self.deps.store.upsert(&security_event).await?;
        self.invalidate_alerts();
        Ok(())
    }

    /// Drop the cached pages this detection made stale: its kind and the unfiltered listing
    fn invalidate_alerts(&self) {
        let cache = self.deps.cache.clone();
        let kind = self.kind;
        spawn_detached("alert_cache_invalidate", self.deps.side_effect_timeout, async move {
            let by_kind = cache.invalidate(Some(kind)).await;
            let all = cache.invalidate(None).await;
            by_kind.and(all)
        });
    }
}

/// Human-readable window length used in alert details
fn describe_window(window: Duration) -> String {
    let secs = window.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the detector and consumer tests

    use super::*;
    use crate::domain::{Alert, PersistedSecurityEvent};
    use crate::error::Error;
    use chrono::{DateTime, TimeZone};
    use std::sync::Mutex;

    pub fn log(ip: &str, status_code: u16) -> AccessLogEvent {
        AccessLogEvent {
            timestamp: at_noon(),
            client_ip: ip.to_string(),
            endpoint: "/api/v1/login".to_string(),
            method: "POST".to_string(),
            status_code,
        }
    }

    pub fn at_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap()
    }

    /// Event store recording upserts, optionally failing them
    #[derive(Default)]
    pub struct RecordingStore {
        pub upserts: Mutex<Vec<SecurityEvent>>,
        pub fail: bool,
    }

    impl RecordingStore {
        pub fn failing() -> Self {
            Self { upserts: Mutex::new(Vec::new()), fail: true }
        }

        pub fn upserts(&self) -> Vec<SecurityEvent> {
            self.upserts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventStore for RecordingStore {
        async fn upsert(&self, event: &SecurityEvent) -> Result<()> {
            if self.fail {
                return Err(Error::Timeout(Duration::from_secs(1)));
            }
            self.upserts.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn find_alerts(&self, _kind: Option<AttackKind>, _limit: usize) -> Result<Vec<PersistedSecurityEvent>> {
            Ok(Vec::new())
        }
    }

    /// Alert cache recording invalidated keys
    #[derive(Default)]
    pub struct RecordingCache {
        pub invalidated: Mutex<Vec<Option<AttackKind>>>,
    }

    impl RecordingCache {
        pub fn invalidated(&self) -> Vec<Option<AttackKind>> {
            self.invalidated.lock().unwrap().clone()
        }

        /// Wait for detached invalidations to land
        pub async fn wait_for(&self, count: usize) -> Vec<Option<AttackKind>> {
            for _ in 0..100 {
                let seen = self.invalidated();
                if seen.len() >= count {
                    return seen;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.invalidated()
        }
    }

    #[async_trait]
    impl AlertCache for RecordingCache {
        async fn get(&self, _kind: Option<AttackKind>) -> Result<Option<Vec<Alert>>> {
            Ok(None)
        }

        async fn set(&self, _kind: Option<AttackKind>, _alerts: &[Alert]) -> Result<()> {
            Ok(())
        }

        async fn invalidate(&self, kind: Option<AttackKind>) -> Result<()> {
            self.invalidated.lock().unwrap().push(kind);
            Ok(())
        }
    }

    /// Rate limiter that is always unreachable
    pub struct UnreachableLimiter;

    #[async_trait]
    impl RateLimiter for UnreachableLimiter {
        async fn check(&self, _namespace: &str, _client_ip: &str, _limit: u32, _window: Duration) -> Result<bool> {
            Err(Error::Timeout(Duration::from_millis(100)))
        }
    }

    pub fn deps(
        limiter: Arc<dyn RateLimiter>,
        store: Arc<RecordingStore>,
        cache: Arc<RecordingCache>,
    ) -> DetectorDeps {
        DetectorDeps {
            limiter,
            store,
            cache,
            side_effect_timeout: Duration::from_secs(1),
        }
    }
}
