//! Brute-force login detection over failed authentications

use async_trait::async_trait;

use super::{describe_window, Detector, DetectorDeps, SlidingWindowRule};
use crate::config::RuleConfig;
use crate::domain::{AccessLogEvent, AttackKind};
use crate::error::Result;

const UNAUTHORIZED: u16 = 401;

/// Counts 401 responses per client; any other status is ignored without
/// touching the rate-limit store.
pub struct BruteForceDetector {
    rule: SlidingWindowRule,
}

impl BruteForceDetector {
    pub fn new(deps: DetectorDeps, rule: RuleConfig) -> Self {
        let details = format!(
            "{} consecutive 401 errors within {}",
            rule.limit,
            describe_window(rule.window())
        );
        Self {
            rule: SlidingWindowRule::new(AttackKind::BruteForce, rule, details, deps),
        }
    }
}

#[async_trait]
impl Detector for BruteForceDetector {
    fn kind(&self) -> AttackKind {
        AttackKind::BruteForce
    }

    async fn detect(&self, event: &AccessLogEvent) -> Result<()> {
        if event.status_code != UNAUTHORIZED {
            return Ok(());
        }
        self.rule.run(event).await
    }
}
