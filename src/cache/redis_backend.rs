use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use super::{alert_key, AlertCache};
use crate::domain::{Alert, AttackKind};
use crate::error::Result;

/// Alert pages stored as JSON strings with a fixed expiry
#[derive(Clone)]
pub struct RedisAlertCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisAlertCache {
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }
}

#[async_trait]
impl AlertCache for RedisAlertCache {
    async fn get(&self, kind: Option<AttackKind>) -> Result<Option<Vec<Alert>>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(alert_key(kind)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, kind: Option<AttackKind>, alerts: &[Alert]) -> Result<()> {
        let payload = serde_json::to_string(alerts)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(alert_key(kind), payload, self.ttl.as_secs()).await?;
        Ok(())
    }

    async fn invalidate(&self, kind: Option<AttackKind>) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(alert_key(kind)).await?;
        Ok(())
    }
}
