//! In-process alert cache for single-node deployments and tests

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{alert_key, AlertCache};
use crate::domain::{Alert, AttackKind};
use crate::error::Result;

pub struct MemoryAlertCache {
    pages: Mutex<TimedCache<String, Vec<Alert>>>,
}

impl MemoryAlertCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pages: Mutex::new(TimedCache::with_lifespan(ttl.as_secs().max(1))),
        }
    }
}

#[async_trait]
impl AlertCache for MemoryAlertCache {
    async fn get(&self, kind: Option<AttackKind>) -> Result<Option<Vec<Alert>>> {
        let mut pages = self.pages.lock().await;
        Ok(pages.cache_get(&alert_key(kind)).cloned())
    }

    async fn set(&self, kind: Option<AttackKind>, alerts: &[Alert]) -> Result<()> {
        let mut pages = self.pages.lock().await;
        pages.cache_set(alert_key(kind), alerts.to_vec());
        Ok(())
    }

    async fn invalidate(&self, kind: Option<AttackKind>) -> Result<()> {
        let mut pages = self.pages.lock().await;
        pages.cache_remove(&alert_key(kind));
        Ok(())
    }
}
