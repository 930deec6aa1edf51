//! Access-log consumer: decode, fan out to detectors, decide ack or drop
//!
//! Per delivery: decode the JSON access log, run every registered detector
//! concurrently under one deadline, and wait for all of them. A clean run is
//! acknowledged. A detector error or an elapsed deadline drops the message
//! without requeue; the next event from the same client retries the check.
//! Undecodable payloads are dropped the same way.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::detector::Detector;
use crate::domain::AccessLogEvent;
use crate::error::{Error, Result};

/// What the broker should do with a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every detector succeeded
    Acked,
    /// A detector failed or the deadline elapsed; drop without requeue
    Rejected,
    /// The payload could not be decoded; drop without requeue
    Malformed,
}

pub struct Consumer {
    detectors: Vec<Arc<dyn Detector>>,
    dispatch_timeout: Duration,
}

impl Consumer {
    pub fn new(detectors: Vec<Arc<dyn Detector>>, dispatch_timeout: Duration) -> Self {
        Self { detectors, dispatch_timeout }
    }

    pub async fn handle(&self, payload: &[u8]) -> Outcome {
        let event: AccessLogEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, bytes = payload.len(), "dropping undecodable access log");
                return Outcome::Malformed;
            }
        };

        debug!(client_ip = %event.client_ip, status = event.status_code, endpoint = %event.endpoint, "consuming access log");

        match self.dispatch(&event).await {
            Ok(()) => Outcome::Acked,
            Err(e) => {
                error!(client_ip = %event.client_ip, error = %e, "detection failed, dropping access log");
                Outcome::Rejected
            }
        }
    }

    /// Run every detector against `event` and wait for all of them.
    ///
    /// Returns the first detector error; the others are logged.
    pub async fn dispatch(&self, event: &AccessLogEvent) -> Result<()> {
        let fan_out = join_all(
            self.detectors
                .iter()
                .map(|detector| async move { (detector.kind(), detector.detect(event).await) }),
        );

        let results = tokio::time::timeout(self.dispatch_timeout, fan_out)
            .await
            .map_err(|_| Error::Timeout(self.dispatch_timeout))?;

        let mut first_error = None;
        for (kind, result) in results {
            if let Err(e) = result {
                error!(detector = %kind, client_ip = %event.client_ip, error = %e, "detector failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
