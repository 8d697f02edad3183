//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - `None` means unbounded; the attempt count still bounds a retry run
//! - Timeout errors are distinct from operation errors

use std::future::Future;
use std::time::Duration;

/// Returned when an attempt exceeds its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out (timeout: {}ms)", .0.as_millis())]
pub struct Elapsed(pub Duration);

/// Run `fut`, racing it against `limit` when one is set.
pub async fn run_with_timeout<F: Future>(
    limit: Option<Duration>,
    fut: F,
) -> Result<F::Output, Elapsed> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Elapsed(limit)),
        None => Ok(fut.await),
    }
}
