//! Alert page cache
//!
//! Pages are keyed `alert:<kind>`, or `alert:all` for the unfiltered listing.
//! The cache may lag the event store: writers invalidate after every
//! persisted detection and entries expire after a fixed TTL.

mod memory;
mod redis_backend;

pub use memory::MemoryAlertCache;
pub use redis_backend::RedisAlertCache;

use async_trait::async_trait;

use crate::domain::{Alert, AttackKind};
use crate::error::Result;

#[async_trait]
pub trait AlertCache: Send + Sync {
    /// Cached page for `kind`, `None` on a miss
    async fn get(&self, kind: Option<AttackKind>) -> Result<Option<Vec<Alert>>>;

    async fn set(&self, kind: Option<AttackKind>, alerts: &[Alert]) -> Result<()>;

    async fn invalidate(&self, kind: Option<AttackKind>) -> Result<()>;
}

pub fn alert_key(kind: Option<AttackKind>) -> String {
    match kind {
        Some(kind) => format!("alert:{}", kind.as_str()),
        None => "alert:all".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_kind() {
        assert_eq!(alert_key(Some(AttackKind::BruteForce)), "alert:bruteforce");
        assert_eq!(alert_key(Some(AttackKind::HighTraffic)), "alert:hightraffic");
        assert_eq!(alert_key(None), "alert:all");
    }
}
