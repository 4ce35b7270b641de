//! Sync protocol error types

use thiserror::Error;

/// Errors surfaced by the pull/state/sweep operations.
///
/// The ingestion path never returns these; its failures divert to the
/// `ingest_error` side channel.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The record store is unreachable or rejected a call
    #[error("upstream store error: {0}")]
    Upstream(#[from] sea_orm::DbErr),

    /// Malformed input, rejected before touching the store
    #[error("invalid request: {0}")]
    Validation(String),

    /// No sync state exists for this (user, device) pair
    #[error("no sync state for user {user_id}, device {device_id:?}")]
    NotFound { user_id: i32, device_id: String },

    /// Concurrent pulls kept winning the watermark race
    #[error("watermark for user {user_id}, device {device_id:?} changed concurrently")]
    Conflict { user_id: i32, device_id: String },
}

impl SyncError {
    /// Transient errors are worth a bounded retry; everything else is terminal
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Upstream(err) => crate::infrastructure::retry::is_transient(err),
            _ => false,
        }
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
