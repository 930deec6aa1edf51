//! Detached background side effects
//!
//! Cache invalidation and cache population must never hold up message
//! acknowledgement or query responses, and must never run without a deadline.
//! Each side effect runs on its own task under its own timeout, detached from
//! the caller's deadline, and reports failures through the log only.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::Result;

/// Spawn `fut` as a detached task bounded by `timeout`.
///
/// Errors and timeouts are logged under `name`. The handle is returned for
/// callers that want to observe completion; dropping it does not cancel the task.
pub fn spawn_detached<F>(name: &'static str, timeout: Duration, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(task = name, error = %e, "background task failed"),
            Err(_) => warn!(task = name, timeout_ms = timeout.as_millis() as u64, "background task timed out"),
        }
    })
}
