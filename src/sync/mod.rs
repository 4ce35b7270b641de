//! The sync core: coalescing writer, pull protocol, archival sweeper
//!
//! `SyncService` is the surface the relay host embeds. Transport framing,
//! auth, CORS and rate limiting are the host's problem; by the time a call
//! lands here the caller identity (user id, device id, app type) is already
//! verified.

use crate::config::SyncConfig;
use crate::infrastructure::retry::with_retry;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;

pub mod app_type;
pub mod archiver;
pub mod error;
pub mod puller;
pub mod writer;

pub use crate::infrastructure::database::entities::change_event::EventKind;
pub use app_type::AppType;
pub use archiver::{ArchiveStats, ArchiveSweeper, SweepReport};
pub use error::{Result, SyncError};
pub use puller::{EventRecord, PullRequest, PullResponse, SyncPuller, SyncStateSnapshot};
pub use writer::{EventWriter, RecordOutcome};

/// The sync core's operation surface
pub struct SyncService {
    db: DatabaseConnection,
    config: SyncConfig,
}

impl SyncService {
    pub fn new(db: DatabaseConnection, config: SyncConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Log one observed mutation. Fire-and-forget: failures divert to the
    /// ingest error channel and never reach the triggering mutation.
    pub async fn record_event(&self, model: &str, record_id: i32, kind: EventKind) -> RecordOutcome {
        EventWriter::record(&self.db, model, record_id, kind).await
    }

    /// Pull the next batch of events for a device.
    pub async fn pull(&self, req: PullRequest) -> Result<PullResponse> {
        with_retry(&self.config.retry, || {
            SyncPuller::pull(&self.db, &self.config, &req)
        })
        .await
    }

    /// Snapshot a device's sync progress.
    pub async fn get_state(&self, user_id: i32, device_id: &str) -> Result<SyncStateSnapshot> {
        with_retry(&self.config.retry, || {
            SyncPuller::get_state(&self.db, user_id, device_id)
        })
        .await
    }

    /// Rewind a device to the start of the log.
    pub async fn reset_state(&self, user_id: i32, device_id: &str) -> Result<()> {
        with_retry(&self.config.retry, || {
            SyncPuller::reset_state(&self.db, user_id, device_id)
        })
        .await
    }

    /// Run the tiered retention policy once.
    pub async fn sweep(&self) -> Result<SweepReport> {
        with_retry(&self.config.retry, || {
            ArchiveSweeper::sweep(&self.db, &self.config)
        })
        .await
    }

    /// Archiving statistics for operators.
    pub async fn stats(&self) -> Result<ArchiveStats> {
        with_retry(&self.config.retry, || ArchiveSweeper::stats(&self.db)).await
    }

    /// Archive all unarchived events of one model.
    pub async fn force_archive_model(
        &self,
        model: &str,
        before: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        ArchiveSweeper::force_archive_model(&self.db, model, before).await
    }

    /// Drop events whose origin record no longer exists. Best-effort.
    pub async fn prune_orphans(&self, model: &str, live_record_ids: &[i32]) -> u64 {
        ArchiveSweeper::prune_orphans(&self.db, model, live_record_ids).await
    }
}
