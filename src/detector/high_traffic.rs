use async_trait::async_trait;

use super::{describe_window, Detector, DetectorDeps, SlidingWindowRule};
use crate::config::RuleConfig;
use crate::domain::{AccessLogEvent, AttackKind};
use crate::error::Result;

/// Counts every request per client regardless of outcome
pub struct HighTrafficDetector {
    rule: SlidingWindowRule,
}

impl HighTrafficDetector {
    pub fn new(deps: DetectorDeps, rule: RuleConfig) -> Self {
        let details = format!(
            "{} consecutive requests within {}",
            rule.limit,
            describe_window(rule.window())
        );
        Self {
            rule: SlidingWindowRule::new(AttackKind::HighTraffic, rule, details, deps),
        }
    }
}

#[async_trait]
impl Detector for HighTrafficDetector {
    fn kind(&self) -> AttackKind {
        AttackKind::HighTraffic
    }

    async fn detect(&self, event: &AccessLogEvent) -> Result<()> {
        self.rule.run(event).await
    }
}
