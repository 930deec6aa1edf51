//! Alert query service: cache-aside reads over the event store
//!
//! Small pages are served from a cached page of `page_size` alerts, so one
//! cached page answers every limit below the page size. Requests at or above
//! the page size are treated as bulk queries and always read the store. After
//! any store read the first page is written back to the cache on a detached
//! task. The cache is an optimization only: its failures are logged and the
//! request falls through to the store.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::AlertCache;
use crate::config::AlertsConfig;
use crate::db::EventStore;
use crate::domain::{Alert, AttackKind};
use crate::error::Result;
use crate::tasks::spawn_detached;

#[derive(Clone)]
pub struct AlertService {
    store: Arc<dyn EventStore>,
    cache: Arc<dyn AlertCache>,
    page_size: usize,
    side_effect_timeout: Duration,
}

impl AlertService {
    pub fn new(store: Arc<dyn EventStore>, cache: Arc<dyn AlertCache>, config: &AlertsConfig) -> Self {
        Self {
            store,
            cache,
            page_size: config.page_size,
            side_effect_timeout: config.side_effect_timeout(),
        }
    }

    pub async fn get_alerts(&self, kind: Option<AttackKind>, limit: usize) -> Result<Vec<Alert>> {
        let cacheable = limit < self.page_size;

        if cacheable {
            match self.cache.get(kind).await {
                Ok(Some(page)) => {
                    debug!(kind = ?kind, limit, "alert cache hit");
                    return Ok(page.into_iter().take(limit).filter(|a| !a.is_padding()).collect());
                }
                Ok(None) => debug!(kind = ?kind, limit, "alert cache miss"),
                Err(e) => warn!(kind = ?kind, error = %e, "alert cache read failed, using store"),
            }
        }

        // A cacheable read fetches the whole page so the cache can be refilled from it.
        let fetch = if cacheable { self.page_size } else { limit };
        let events = self.store.find_alerts(kind, fetch).await?;
        let mut alerts: Vec<Alert> = events.iter().map(Alert::from).collect();

        self.populate(kind, &alerts);

        alerts.truncate(limit);
        Ok(alerts)
    }

    /// Write exactly one page back to the cache, padded with empty alerts
    fn populate(&self, kind: Option<AttackKind>, alerts: &[Alert]) {
        let mut page: Vec<Alert> = alerts.iter().take(self.page_size).cloned().collect();
        page.resize(self.page_size, Alert::default());

        let cache = self.cache.clone();
        spawn_detached("alert_cache_populate", self.side_effect_timeout, async move {
            cache.set(kind, &page).await
        });
    }
}
