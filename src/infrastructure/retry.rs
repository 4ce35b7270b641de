//! Bounded retry with exponential backoff for transient store failures
//!
//! Only connection-level errors are retried. Application-level rejects
//! (validation, not-found, conflicts, constraint hits) are terminal decisions
//! and map to permanent errors.

use crate::sync::error::SyncError;
use backoff::ExponentialBackoffBuilder;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy for store operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Total time budget for retries in milliseconds
    pub max_elapsed_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 300,
            max_elapsed_ms: 2_000,
        }
    }
}

/// Whether a store error is worth retrying
pub fn is_transient(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
}

/// Run `op` with bounded exponential backoff on transient store errors.
pub async fn with_retry<T, Fut, F>(policy: &RetryPolicy, mut op: F) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(policy.initial_backoff_ms))
        .with_max_elapsed_time(Some(Duration::from_millis(policy.max_elapsed_ms)))
        .build();

    backoff::future::retry(backoff, || {
        let fut = op();
        async move {
            fut.await.map_err(|err| {
                if err.is_transient() {
                    warn!("Transient store error, will retry: {err}");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        }
    })
    .await
}
