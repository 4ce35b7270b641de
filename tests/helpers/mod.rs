//! Shared fixtures for the sync core integration tests
#![allow(dead_code)]

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use smartsync_core::infrastructure::database::entities::{change_event, device_sync_state};
use smartsync_core::{Database, EventKind, SyncConfig, SyncService};

/// Fresh in-memory store with migrations applied
pub async fn test_service() -> (SyncService, DatabaseConnection) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let db = Database::in_memory().await.expect("in-memory database");
    db.migrate().await.expect("migrations");
    let conn = db.conn().clone();
    (SyncService::new(conn.clone(), SyncConfig::default()), conn)
}

/// Insert an event row directly, back-dated by `age_days`.
/// `archived_days_ago` pre-archives it with that archive date.
pub async fn seed_event(
    conn: &DatabaseConnection,
    model: &str,
    record_id: i32,
    kind: EventKind,
    age_days: i64,
    archived_days_ago: Option<i64>,
    acked_by: i32,
) -> i32 {
    let now = Utc::now();
    let row = change_event::ActiveModel {
        model: Set(model.to_owned()),
        record_id: Set(record_id),
        event: Set(kind),
        timestamp: Set(now - Duration::days(age_days)),
        is_archived: Set(archived_days_ago.is_some()),
        archive_date: Set(archived_days_ago.map(|days| now - Duration::days(days))),
        synced_device_count: Set(acked_by),
        ..Default::default()
    };
    row.insert(conn).await.expect("seed event").id
}

/// Insert a device watermark row directly, back-dated by `last_sync_age_days`.
pub async fn seed_device(
    conn: &DatabaseConnection,
    user_id: i32,
    device_id: &str,
    last_sync_age_days: i64,
) -> i32 {
    let row = device_sync_state::ActiveModel {
        user_id: Set(user_id),
        device_id: Set(device_id.to_owned()),
        app_type: Set("sales_app".to_owned()),
        last_event_id: Set(0),
        last_sync_time: Set(Utc::now() - Duration::days(last_sync_age_days)),
        sync_count: Set(0),
        is_active: Set(true),
        ..Default::default()
    };
    row.insert(conn).await.expect("seed device").id
}
