//! Coalescing writer - the fire-and-forget ingestion path
//!
//! Every tracked mutation lands here. The log keeps at most one unresolved
//! event per (model, record_id, kind): duplicates are skipped, a create wipes
//! any earlier unconsumed writes, and a write arriving after an unconsumed
//! create is suppressed because the create already implies current state.
//! Nothing here may block or fail the mutation that triggered it, so every
//! store error is captured into the `ingest_error` table and swallowed.

use crate::infrastructure::database::entities::{change_event, ingest_error};
use crate::sync::EventKind;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use tracing::{error, info, warn};

/// What the writer did with an incoming event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new event row was appended, with its store-assigned id
    Logged(i32),
    /// An identical unresolved event already exists
    DuplicateSkipped,
    /// A write arrived while an unconsumed create is pending
    SuppressedByCreate,
    /// A store failure was captured to the error side channel
    ErrorCaptured,
}

pub struct EventWriter;

impl EventWriter {
    /// Record one observed mutation. Never fails from the caller's view.
    pub async fn record(db: &DbConn, model: &str, record_id: i32, kind: EventKind) -> RecordOutcome {
        match Self::try_record(db, model, record_id, kind).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Failed to log {kind:?} event for {model} #{record_id}: {err}");
                Self::capture_error(db, model, record_id, &err).await;
                RecordOutcome::ErrorCaptured
            }
        }
    }

    async fn try_record(
        db: &DbConn,
        model: &str,
        record_id: i32,
        kind: EventKind,
    ) -> Result<RecordOutcome, DbErr> {
        let same_transition = change_event::Entity::find()
            .filter(change_event::Column::Model.eq(model))
            .filter(change_event::Column::RecordId.eq(record_id))
            .filter(change_event::Column::Event.eq(kind))
            .count(db)
            .await?;

        if same_transition > 0 {
            warn!("Skipping duplicate {kind:?} event for {model} #{record_id}");
            return Ok(RecordOutcome::DuplicateSkipped);
        }

        match kind {
            EventKind::Create => {
                // A create supersedes any write recorded before it; stale
                // writes from the origin's ordering must not leak.
                let removed = change_event::Entity::delete_many()
                    .filter(change_event::Column::Model.eq(model))
                    .filter(change_event::Column::RecordId.eq(record_id))
                    .filter(change_event::Column::Event.eq(EventKind::Write))
                    .exec(db)
                    .await?;
                if removed.rows_affected > 0 {
                    info!(
                        "Removed {} stale write event(s) for {model} #{record_id} after create",
                        removed.rows_affected
                    );
                }
            }
            EventKind::Write => {
                let pending_create = change_event::Entity::find()
                    .filter(change_event::Column::Model.eq(model))
                    .filter(change_event::Column::RecordId.eq(record_id))
                    .filter(change_event::Column::Event.eq(EventKind::Create))
                    .count(db)
                    .await?;
                if pending_create > 0 {
                    info!("Suppressing write for {model} #{record_id}: unconsumed create pending");
                    return Ok(RecordOutcome::SuppressedByCreate);
                }
            }
            EventKind::Unlink => {}
        }

        let row = change_event::ActiveModel {
            model: Set(model.to_owned()),
            record_id: Set(record_id),
            event: Set(kind),
            ..change_event::ActiveModel::new()
        };

        // The unique index over (model, record_id, event) closes the race
        // two concurrent writers open between the check above and this insert.
        let insert = change_event::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    change_event::Column::Model,
                    change_event::Column::RecordId,
                    change_event::Column::Event,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await;

        match insert {
            Ok(res) => {
                info!("Logged {kind:?} event #{} for {model} #{record_id}", res.last_insert_id);
                Ok(RecordOutcome::Logged(res.last_insert_id))
            }
            Err(DbErr::RecordNotInserted) => {
                warn!("Lost insert race for {kind:?} event on {model} #{record_id}, skipping");
                Ok(RecordOutcome::DuplicateSkipped)
            }
            Err(err) => Err(err),
        }
    }

    /// Best-effort capture into the error side channel; a failure writing the
    /// error row itself is only logged.
    async fn capture_error(db: &DbConn, model: &str, record_id: i32, err: &DbErr) {
        let row = ingest_error::ActiveModel {
            model: Set(model.to_owned()),
            record_id: Set(record_id),
            error_message: Set(err.to_string()),
            ..ingest_error::ActiveModel::new()
        };

        if let Err(side_err) = row.insert(db).await {
            error!("Could not persist ingest error for {model} #{record_id}: {side_err}");
        }
    }
}
