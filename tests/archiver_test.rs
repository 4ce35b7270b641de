//! Tiered archival and retention sweep behavior

mod helpers;

use chrono::{Duration, Utc};
use helpers::{seed_device, seed_event, test_service};
use pretty_assertions::assert_eq;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use smartsync_core::infrastructure::database::entities::{change_event, device_sync_state};
use smartsync_core::{AppType, ArchiveSweeper, EventKind, PullRequest, SyncConfig};

#[tokio::test]
async fn sweep_applies_the_three_tiers_in_order() {
    let (service, conn) = test_service().await;

    // Two devices active inside the 7-day window.
    seed_device(&conn, 1, "tablet-01", 0).await;
    seed_device(&conn, 2, "phone-02", 1).await;

    // Ages 5 / 10 / 35 days unarchived, plus one archived 91 days ago and one
    // archived only 10 days ago.
    let fresh = seed_event(&conn, "sale.order", 1, EventKind::Create, 5, None, 2).await;
    let acked = seed_event(&conn, "sale.order", 2, EventKind::Create, 10, None, 2).await;
    let stale = seed_event(&conn, "sale.order", 3, EventKind::Create, 35, None, 0).await;
    let purgeable = seed_event(&conn, "sale.order", 4, EventKind::Create, 95, Some(91), 2).await;
    let retained = seed_event(&conn, "sale.order", 5, EventKind::Create, 95, Some(10), 2).await;

    let report = service.sweep().await.unwrap();
    assert_eq!(report.archived, 1); // the 10-day, fully-acked event
    assert_eq!(report.force_archived, 1); // the 35-day event, acks ignored
    assert_eq!(report.purged, 1); // only the one archived 91 days ago
    assert_eq!(report.total_processed(), 3);

    let by_id = |id: i32| {
        let conn = &conn;
        async move { change_event::Entity::find_by_id(id).one(conn).await.unwrap() }
    };
    assert!(!by_id(fresh).await.unwrap().is_archived);
    assert!(by_id(acked).await.unwrap().is_archived);
    assert!(by_id(stale).await.unwrap().is_archived);
    assert!(by_id(purgeable).await.is_none());
    // Raw event age alone never purges; the archive date drives the clock.
    assert!(by_id(retained).await.is_some());
}

#[tokio::test]
async fn soft_archive_waits_for_every_active_device() {
    let (service, conn) = test_service().await;

    seed_device(&conn, 1, "tablet-01", 0).await;
    seed_device(&conn, 2, "phone-02", 0).await;

    // Old enough, but only one of two active devices has acked it.
    let id = seed_event(&conn, "sale.order", 1, EventKind::Create, 10, None, 1).await;

    let report = service.sweep().await.unwrap();
    assert_eq!(report.archived, 0);

    let event = change_event::Entity::find_by_id(id).one(&conn).await.unwrap().unwrap();
    assert!(!event.is_archived);
}

#[tokio::test]
async fn no_active_devices_means_no_soft_archive() {
    let (service, conn) = test_service().await;

    // Device fell outside the 7-day activity window.
    seed_device(&conn, 1, "tablet-01", 12).await;
    seed_event(&conn, "sale.order", 1, EventKind::Create, 10, None, 5).await;

    let report = service.sweep().await.unwrap();
    assert_eq!(report.archived, 0);
    assert_eq!(report.force_archived, 0);
}

#[tokio::test]
async fn sweep_is_idempotent() {
    let (service, conn) = test_service().await;

    seed_device(&conn, 1, "tablet-01", 0).await;
    seed_event(&conn, "sale.order", 1, EventKind::Create, 10, None, 1).await;
    seed_event(&conn, "sale.order", 2, EventKind::Create, 35, None, 0).await;

    let first = service.sweep().await.unwrap();
    assert_eq!(first.total_processed(), 2);

    let second = service.sweep().await.unwrap();
    assert_eq!(second.total_processed(), 0);
    assert_eq!(second, Default::default());
}

#[tokio::test]
async fn silent_devices_are_deactivated_not_deleted() {
    let (service, conn) = test_service().await;

    seed_device(&conn, 1, "tablet-01", 40).await;
    seed_device(&conn, 2, "phone-02", 2).await;

    let report = service.sweep().await.unwrap();
    assert_eq!(report.deactivated_devices, 1);

    let states = device_sync_state::Entity::find().all(&conn).await.unwrap();
    assert_eq!(states.len(), 2);
    let silent = states.iter().find(|s| s.device_id == "tablet-01").unwrap();
    assert!(!silent.is_active);
    // Watermark survives deactivation for a returning device.
    let snapshot = service.get_state(1, "tablet-01").await.unwrap();
    assert!(!snapshot.is_active);
}

#[tokio::test]
async fn archived_events_are_excluded_from_pulls() {
    let (service, conn) = test_service().await;

    seed_event(&conn, "sale.order", 1, EventKind::Create, 0, Some(0), 0).await;
    seed_event(&conn, "sale.order", 2, EventKind::Create, 0, None, 0).await;

    let response = service
        .pull(PullRequest {
            user_id: 1,
            device_id: "tablet-01".to_owned(),
            app_type: AppType::SalesApp,
            models_filter: None,
            limit: None,
        })
        .await
        .unwrap();

    assert_eq!(response.new_events_count, 1);
    assert_eq!(response.events[0].record_id, 2);
}

#[tokio::test]
async fn force_archive_model_respects_the_cutoff() {
    let (service, conn) = test_service().await;

    seed_event(&conn, "sale.order", 1, EventKind::Create, 10, None, 0).await;
    seed_event(&conn, "sale.order", 2, EventKind::Create, 1, None, 0).await;
    seed_event(&conn, "res.partner", 3, EventKind::Create, 10, None, 0).await;

    let cutoff = Utc::now() - Duration::days(5);
    let archived = service
        .force_archive_model("sale.order", Some(cutoff))
        .await
        .unwrap();
    assert_eq!(archived, 1);

    let remaining_active = change_event::Entity::find()
        .filter(change_event::Column::IsArchived.eq(false))
        .count(&conn)
        .await
        .unwrap();
    assert_eq!(remaining_active, 2);

    // Without a cutoff the whole model is archived.
    let archived = service.force_archive_model("sale.order", None).await.unwrap();
    assert_eq!(archived, 1);
}

#[tokio::test]
async fn prune_orphans_drops_events_for_dead_records() {
    let (service, conn) = test_service().await;

    seed_event(&conn, "sale.order", 1, EventKind::Create, 0, None, 0).await;
    seed_event(&conn, "sale.order", 2, EventKind::Create, 0, None, 0).await;
    seed_event(&conn, "res.partner", 2, EventKind::Create, 0, None, 0).await;

    let pruned = service.prune_orphans("sale.order", &[1]).await;
    assert_eq!(pruned, 1);

    let survivors = change_event::Entity::find().all(&conn).await.unwrap();
    assert_eq!(survivors.len(), 2);
    assert!(survivors
        .iter()
        .all(|event| event.model == "res.partner" || event.record_id == 1));
}

#[tokio::test]
async fn stats_report_the_archive_split() {
    let (service, conn) = test_service().await;

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total_events, 0);
    assert_eq!(stats.archive_percentage, 0.0);
    assert!(stats.oldest_unarchived.is_none());

    seed_event(&conn, "sale.order", 1, EventKind::Create, 20, None, 0).await;
    seed_event(&conn, "sale.order", 2, EventKind::Create, 2, None, 0).await;
    seed_event(&conn, "sale.order", 3, EventKind::Create, 50, Some(5), 0).await;
    seed_event(&conn, "sale.order", 4, EventKind::Create, 50, Some(8), 0).await;

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total_events, 4);
    assert_eq!(stats.active_events, 2);
    assert_eq!(stats.archived_events, 2);
    assert_eq!(stats.archive_percentage, 50.0);
    let oldest = stats.oldest_unarchived.unwrap();
    assert!(oldest < Utc::now() - Duration::days(19));
}

#[tokio::test]
async fn clock_injected_sweep_matches_the_wall_clock_path() {
    let (_service, conn) = test_service().await;

    seed_device(&conn, 1, "tablet-01", 0).await;
    seed_event(&conn, "sale.order", 1, EventKind::Create, 35, None, 0).await;

    let config = SyncConfig::default();
    let report = ArchiveSweeper::sweep_at(&conn, &config, Utc::now()).await.unwrap();
    assert_eq!(report.force_archived, 1);
}
