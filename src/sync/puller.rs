//! Sync puller - watermark-anchored incremental pull
//!
//! Each device pulls events with id above its watermark, oldest first, so
//! the watermark always advances over a prefix of the log and never skips a
//! gap. Advancement is a compare-and-set on the previous watermark value;
//! concurrent pulls from the same device cannot double-advance.

use crate::config::SyncConfig;
use crate::infrastructure::database::entities::{change_event, device_sync_state, event_ack};
use crate::sync::app_type::AppType;
use crate::sync::error::{Result, SyncError};
use crate::sync::EventKind;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelBehavior, ColumnTrait, DbConn, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Attempts at the fetch-then-advance sequence before reporting a conflict
const WATERMARK_CAS_ATTEMPTS: u32 = 3;

/// One pull request from a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub user_id: i32,
    pub device_id: String,
    pub app_type: AppType,
    /// Optional extra filter, intersected with the app type's allowed set.
    /// An empty list means no extra filter, same as `None`.
    pub models_filter: Option<Vec<String>>,
    /// Batch size; defaults to the configured `default_pull_limit` when
    /// omitted and is clamped to the configured maximum
    pub limit: Option<u64>,
}

/// One event as returned to a syncing device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i32,
    pub model: String,
    pub record_id: i32,
    pub event: EventKind,
    pub timestamp: chrono::DateTime<Utc>,
}

impl From<change_event::Model> for EventRecord {
    fn from(row: change_event::Model) -> Self {
        Self {
            id: row.id,
            model: row.model,
            record_id: row.record_id,
            event: row.event,
            timestamp: row.timestamp,
        }
    }
}

/// Response to a pull: the batch plus the re-pull anchor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    pub has_updates: bool,
    pub new_events_count: usize,
    pub events: Vec<EventRecord>,
    /// Opaque to the caller; echoes the advanced watermark
    pub next_sync_token: String,
    /// The device's last sync instant before this pull
    pub last_sync_time: chrono::DateTime<Utc>,
}

/// Snapshot of a device's sync progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStateSnapshot {
    pub user_id: i32,
    pub device_id: String,
    pub app_type: String,
    pub last_event_id: i32,
    pub last_sync_time: chrono::DateTime<Utc>,
    pub sync_count: i32,
    pub is_active: bool,
}

impl From<device_sync_state::Model> for SyncStateSnapshot {
    fn from(row: device_sync_state::Model) -> Self {
        Self {
            user_id: row.user_id,
            device_id: row.device_id,
            app_type: row.app_type,
            last_event_id: row.last_event_id,
            last_sync_time: row.last_sync_time,
            sync_count: row.sync_count,
            is_active: row.is_active,
        }
    }
}

pub struct SyncPuller;

impl SyncPuller {
    /// Pull the next batch of events for a device and advance its watermark.
    pub async fn pull(db: &DbConn, config: &SyncConfig, req: &PullRequest) -> Result<PullResponse> {
        if req.device_id.trim().is_empty() {
            return Err(SyncError::Validation("device_id must not be empty".into()));
        }

        for attempt in 0..WATERMARK_CAS_ATTEMPTS {
            let state = Self::get_or_create_state(db, req).await?;

            if let Some(response) = Self::pull_anchored(db, config, req, &state).await? {
                return Ok(response);
            }

            warn!(
                "Lost watermark race for user {} device {:?} (attempt {})",
                req.user_id,
                req.device_id,
                attempt + 1
            );
        }

        Err(SyncError::Conflict {
            user_id: req.user_id,
            device_id: req.device_id.clone(),
        })
    }

    /// One fetch-then-advance attempt anchored at a previously read state
    /// row. Returns `None` when the stored watermark no longer matches the
    /// anchor, meaning a concurrent pull advanced it first and the caller
    /// must re-read before retrying.
    pub async fn pull_anchored(
        db: &DbConn,
        config: &SyncConfig,
        req: &PullRequest,
        state: &device_sync_state::Model,
    ) -> Result<Option<PullResponse>> {
        let limit = req
            .limit
            .unwrap_or(config.default_pull_limit)
            .clamp(1, config.max_pull_limit);

        let mut query = change_event::Entity::find()
            .filter(change_event::Column::Id.gt(state.last_event_id))
            .filter(change_event::Column::IsArchived.eq(false))
            .filter(change_event::Column::Model.is_in(req.app_type.allowed_models().iter().copied()));
        // An empty filter list means "no extra filter", as the origin treats it.
        if let Some(models) = req.models_filter.as_deref().filter(|models| !models.is_empty()) {
            query =
                query.filter(change_event::Column::Model.is_in(models.iter().map(String::as_str)));
        }

        let events = query
            .order_by_asc(change_event::Column::Id)
            .limit(limit)
            .all(db)
            .await
            .map_err(SyncError::Upstream)?;

        let Some(last) = events.last() else {
            return Ok(Some(PullResponse {
                has_updates: false,
                new_events_count: 0,
                events: Vec::new(),
                next_sync_token: state.last_event_id.to_string(),
                last_sync_time: state.last_sync_time,
            }));
        };
        let new_watermark = last.id;

        if !Self::advance_watermark(db, state, new_watermark).await? {
            return Ok(None);
        }

        for event in &events {
            if let Err(err) = Self::acknowledge(db, event.id, req.user_id, &req.device_id).await {
                // Non-fatal: the batch and watermark stand regardless.
                warn!(
                    "Could not mark event #{} as synced by device {:?}: {err}",
                    event.id, req.device_id
                );
            }
        }

        info!(
            "Device {:?} of user {} pulled {} event(s), watermark {} -> {}",
            req.device_id,
            req.user_id,
            events.len(),
            state.last_event_id,
            new_watermark
        );

        Ok(Some(PullResponse {
            has_updates: true,
            new_events_count: events.len(),
            events: events.into_iter().map(EventRecord::from).collect(),
            next_sync_token: new_watermark.to_string(),
            last_sync_time: state.last_sync_time,
        }))
    }

    /// Snapshot of a device's sync state
    pub async fn get_state(db: &DbConn, user_id: i32, device_id: &str) -> Result<SyncStateSnapshot> {
        Self::find_state(db, user_id, device_id)
            .await?
            .map(SyncStateSnapshot::from)
            .ok_or_else(|| SyncError::NotFound {
                user_id,
                device_id: device_id.to_owned(),
            })
    }

    /// Rewind a device to the start of the log (troubleshooting aid)
    pub async fn reset_state(db: &DbConn, user_id: i32, device_id: &str) -> Result<()> {
        let reset = device_sync_state::Entity::update_many()
            .col_expr(device_sync_state::Column::LastEventId, Expr::value(0))
            .col_expr(device_sync_state::Column::SyncCount, Expr::value(0))
            .filter(device_sync_state::Column::UserId.eq(user_id))
            .filter(device_sync_state::Column::DeviceId.eq(device_id))
            .exec(db)
            .await
            .map_err(SyncError::Upstream)?;

        if reset.rows_affected == 0 {
            return Err(SyncError::NotFound {
                user_id,
                device_id: device_id.to_owned(),
            });
        }

        info!("Reset sync state for user {user_id}, device {device_id:?}");
        Ok(())
    }

    async fn find_state(
        db: &DbConn,
        user_id: i32,
        device_id: &str,
    ) -> Result<Option<device_sync_state::Model>> {
        device_sync_state::Entity::find()
            .filter(device_sync_state::Column::UserId.eq(user_id))
            .filter(device_sync_state::Column::DeviceId.eq(device_id))
            .one(db)
            .await
            .map_err(SyncError::Upstream)
    }

    async fn get_or_create_state(
        db: &DbConn,
        req: &PullRequest,
    ) -> Result<device_sync_state::Model> {
        if let Some(state) = Self::find_state(db, req.user_id, &req.device_id).await? {
            return Ok(state);
        }

        let row = device_sync_state::ActiveModel {
            user_id: Set(req.user_id),
            device_id: Set(req.device_id.clone()),
            app_type: Set(req.app_type.to_string()),
            ..device_sync_state::ActiveModel::new()
        };

        // A concurrent first pull may have created the row between the read
        // and this insert; the unique (user_id, device_id) index makes that
        // a no-op and the re-read below picks up the winner.
        match device_sync_state::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    device_sync_state::Column::UserId,
                    device_sync_state::Column::DeviceId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await
        {
            Ok(_) => {
                info!(
                    "Created sync state for user {}, device {:?} ({})",
                    req.user_id, req.device_id, req.app_type
                );
            }
            Err(DbErr::RecordNotInserted) => {}
            Err(err) => return Err(SyncError::Upstream(err)),
        }

        Self::find_state(db, req.user_id, &req.device_id)
            .await?
            .ok_or_else(|| {
                SyncError::Upstream(DbErr::Custom(
                    "sync state vanished after conditional insert".into(),
                ))
            })
    }

    /// CAS-advance: succeeds only if the stored watermark still matches the
    /// one this pull fetched against.
    async fn advance_watermark(
        db: &DbConn,
        state: &device_sync_state::Model,
        new_watermark: i32,
    ) -> Result<bool> {
        let advanced = device_sync_state::Entity::update_many()
            .col_expr(
                device_sync_state::Column::LastEventId,
                Expr::value(new_watermark),
            )
            .col_expr(
                device_sync_state::Column::LastSyncTime,
                Expr::value(Utc::now()),
            )
            .col_expr(
                device_sync_state::Column::SyncCount,
                Expr::col(device_sync_state::Column::SyncCount).add(1),
            )
            .filter(device_sync_state::Column::Id.eq(state.id))
            .filter(device_sync_state::Column::LastEventId.eq(state.last_event_id))
            .exec(db)
            .await
            .map_err(SyncError::Upstream)?;

        Ok(advanced.rows_affected == 1)
    }

    /// Idempotent per-device acknowledgment: a set-membership insert, with the
    /// event's counter bumped only when the membership row was actually new.
    async fn acknowledge(
        db: &DbConn,
        event_id: i32,
        user_id: i32,
        device_id: &str,
    ) -> std::result::Result<(), DbErr> {
        let row = event_ack::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            device_id: Set(device_id.to_owned()),
            ..event_ack::ActiveModel::new()
        };

        match event_ack::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    event_ack::Column::EventId,
                    event_ack::Column::UserId,
                    event_ack::Column::DeviceId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await
        {
            Ok(_) => {
                change_event::Entity::update_many()
                    .col_expr(
                        change_event::Column::SyncedDeviceCount,
                        Expr::col(change_event::Column::SyncedDeviceCount).add(1),
                    )
                    .filter(change_event::Column::Id.eq(event_id))
                    .exec(db)
                    .await?;
                Ok(())
            }
            // Already a member; replays never double-count.
            Err(DbErr::RecordNotInserted) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
