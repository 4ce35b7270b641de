//! Archival sweeper - tiered retention over the event log
//!
//! Three tiers, in order: soft-archive events every currently-active device
//! has acknowledged, force-archive events past the hard age cutoff whatever
//! their acknowledgment count, then purge events whose *archive date* has
//! aged out. The purge clock starts at archival, not at the event itself.
//! A fourth pass soft-deactivates long-silent devices; their watermarks are
//! kept so a returning device resumes where it left off.
//!
//! The force-archive tier deliberately ignores acknowledgments; without it
//! the log grows without bound whenever a device goes permanently offline.
//! A device that comes back after a force-archive-plus-purge window may miss
//! those events for good, which the protocol accepts.

use crate::config::SyncConfig;
use crate::infrastructure::database::entities::{change_event, device_sync_state};
use crate::sync::error::{Result, SyncError};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DbConn, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Per-tier counts from one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub archived: u64,
    pub force_archived: u64,
    pub purged: u64,
    pub deactivated_devices: u64,
}

impl SweepReport {
    pub fn total_processed(&self) -> u64 {
        self.archived + self.force_archived + self.purged
    }
}

/// Point-in-time shape of the event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub total_events: u64,
    pub active_events: u64,
    pub archived_events: u64,
    pub oldest_unarchived: Option<DateTime<Utc>>,
    pub archive_percentage: f64,
}

pub struct ArchiveSweeper;

impl ArchiveSweeper {
    /// Run the retention policy against the current clock.
    pub async fn sweep(db: &DbConn, config: &SyncConfig) -> Result<SweepReport> {
        Self::sweep_at(db, config, Utc::now()).await
    }

    /// Clock-injected sweep; `sweep` delegates here. Idempotent under re-run.
    pub async fn sweep_at(db: &DbConn, config: &SyncConfig, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        // Tier 1: archive aged events every currently-active device has seen.
        let active_devices = Self::active_device_count(db, config, now).await?;
        info!("Sweep: {active_devices} active device(s) in the last {} day(s)", config.active_window_days);

        if active_devices > 0 {
            let soft_cutoff = now - Duration::days(config.archive_after_days);
            let archived = change_event::Entity::update_many()
                .col_expr(change_event::Column::IsArchived, Expr::value(true))
                .col_expr(change_event::Column::ArchiveDate, Expr::value(now))
                .filter(change_event::Column::IsArchived.eq(false))
                .filter(change_event::Column::Timestamp.lte(soft_cutoff))
                .filter(change_event::Column::SyncedDeviceCount.gte(active_devices as i32))
                .exec(db)
                .await
                .map_err(SyncError::Upstream)?;
            report.archived = archived.rows_affected;
            if report.archived > 0 {
                info!(
                    "Archived {} event(s) older than {} day(s) acked by all active devices",
                    report.archived, config.archive_after_days
                );
            }
        }

        // Tier 2: force-archive past the hard cutoff, acks or not.
        let force_cutoff = now - Duration::days(config.force_archive_after_days);
        let forced = change_event::Entity::update_many()
            .col_expr(change_event::Column::IsArchived, Expr::value(true))
            .col_expr(change_event::Column::ArchiveDate, Expr::value(now))
            .filter(change_event::Column::IsArchived.eq(false))
            .filter(change_event::Column::Timestamp.lte(force_cutoff))
            .exec(db)
            .await
            .map_err(SyncError::Upstream)?;
        report.force_archived = forced.rows_affected;
        if report.force_archived > 0 {
            info!(
                "Force archived {} event(s) older than {} day(s)",
                report.force_archived, config.force_archive_after_days
            );
        }

        // Tier 3: purge archived events whose archive date has aged out.
        let purge_cutoff = now - Duration::days(config.purge_after_days);
        let purged = change_event::Entity::delete_many()
            .filter(change_event::Column::IsArchived.eq(true))
            .filter(change_event::Column::ArchiveDate.lte(purge_cutoff))
            .exec(db)
            .await
            .map_err(SyncError::Upstream)?;
        report.purged = purged.rows_affected;
        if report.purged > 0 {
            info!(
                "Purged {} archived event(s) past the {}-day retention",
                report.purged, config.purge_after_days
            );
        }

        // Soft-deactivate silent devices; never delete their watermarks.
        let deactivate_cutoff = now - Duration::days(config.deactivate_after_days);
        let deactivated = device_sync_state::Entity::update_many()
            .col_expr(device_sync_state::Column::IsActive, Expr::value(false))
            .filter(device_sync_state::Column::IsActive.eq(true))
            .filter(device_sync_state::Column::LastSyncTime.lte(deactivate_cutoff))
            .exec(db)
            .await
            .map_err(SyncError::Upstream)?;
        report.deactivated_devices = deactivated.rows_affected;
        if report.deactivated_devices > 0 {
            info!(
                "Marked {} device state(s) inactive after {} day(s) of silence",
                report.deactivated_devices, config.deactivate_after_days
            );
        }

        Ok(report)
    }

    /// Archiving statistics for operators
    pub async fn stats(db: &DbConn) -> Result<ArchiveStats> {
        let total = change_event::Entity::find().count(db).await?;
        let archived = change_event::Entity::find()
            .filter(change_event::Column::IsArchived.eq(true))
            .count(db)
            .await?;

        let oldest_unarchived = change_event::Entity::find()
            .filter(change_event::Column::IsArchived.eq(false))
            .order_by_asc(change_event::Column::Timestamp)
            .one(db)
            .await?
            .map(|row| row.timestamp);

        let archive_percentage = if total > 0 {
            (archived as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        Ok(ArchiveStats {
            total_events: total,
            active_events: total - archived,
            archived_events: archived,
            oldest_unarchived,
            archive_percentage,
        })
    }

    /// Archive all unarchived events of one model, optionally only those at
    /// or before a cutoff. Returns how many were archived.
    pub async fn force_archive_model(
        db: &DbConn,
        model: &str,
        before: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let mut query = change_event::Entity::update_many()
            .col_expr(change_event::Column::IsArchived, Expr::value(true))
            .col_expr(change_event::Column::ArchiveDate, Expr::value(Utc::now()))
            .filter(change_event::Column::IsArchived.eq(false))
            .filter(change_event::Column::Model.eq(model));
        if let Some(cutoff) = before {
            query = query.filter(change_event::Column::Timestamp.lte(cutoff));
        }

        let archived = query.exec(db).await.map_err(SyncError::Upstream)?;
        if archived.rows_affected > 0 {
            info!("Force archived {} event(s) for model {model}", archived.rows_affected);
        }
        Ok(archived.rows_affected)
    }

    /// Drop events of `model` whose record no longer exists upstream. The
    /// origin records live outside this store, so the caller supplies the
    /// surviving ids. Best-effort maintenance: failures are logged, not
    /// raised.
    pub async fn prune_orphans(db: &DbConn, model: &str, live_record_ids: &[i32]) -> u64 {
        let result = change_event::Entity::delete_many()
            .filter(change_event::Column::Model.eq(model))
            .filter(change_event::Column::RecordId.is_not_in(live_record_ids.iter().copied()))
            .exec(db)
            .await;

        match result {
            Ok(deleted) => {
                if deleted.rows_affected > 0 {
                    info!(
                        "Pruned {} orphaned event(s) for model {model}",
                        deleted.rows_affected
                    );
                }
                deleted.rows_affected
            }
            Err(err) => {
                tracing::warn!("Orphan prune for model {model} failed: {err}");
                0
            }
        }
    }

    async fn active_device_count(
        db: &DbConn,
        config: &SyncConfig,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let cutoff = now - Duration::days(config.active_window_days);
        device_sync_state::Entity::find()
            .filter(device_sync_state::Column::IsActive.eq(true))
            .filter(device_sync_state::Column::LastSyncTime.gte(cutoff))
            .count(db)
            .await
            .map_err(SyncError::Upstream)
    }
}
