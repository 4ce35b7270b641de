//! Create the sync core tables: change event log, device watermarks,
//! per-device acknowledgments, and the ingestion error side channel.
//!
//! The unique indexes are load-bearing: they enforce the
//! one-unresolved-event-per-(model, record_id, event) and
//! one-state-per-(user, device) invariants at the store level, so conflicting
//! concurrent inserts collapse instead of racing past an application check.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChangeEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChangeEvent::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChangeEvent::Model).string().not_null())
                    .col(ColumnDef::new(ChangeEvent::RecordId).integer().not_null())
                    .col(ColumnDef::new(ChangeEvent::Event).string().not_null())
                    .col(ColumnDef::new(ChangeEvent::Timestamp).timestamp().not_null())
                    .col(
                        ColumnDef::new(ChangeEvent::IsArchived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ChangeEvent::ArchiveDate).timestamp())
                    .col(
                        ColumnDef::new(ChangeEvent::SyncedDeviceCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_change_event_unique_transition")
                    .table(ChangeEvent::Table)
                    .col(ChangeEvent::Model)
                    .col(ChangeEvent::RecordId)
                    .col(ChangeEvent::Event)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_change_event_model")
                    .table(ChangeEvent::Table)
                    .col(ChangeEvent::Model)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_change_event_is_archived")
                    .table(ChangeEvent::Table)
                    .col(ChangeEvent::IsArchived)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_change_event_timestamp")
                    .table(ChangeEvent::Table)
                    .col(ChangeEvent::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeviceSyncState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceSyncState::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeviceSyncState::UserId).integer().not_null())
                    .col(ColumnDef::new(DeviceSyncState::DeviceId).string().not_null())
                    .col(ColumnDef::new(DeviceSyncState::AppType).string().not_null())
                    .col(
                        ColumnDef::new(DeviceSyncState::LastEventId)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DeviceSyncState::LastSyncTime)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceSyncState::SyncCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DeviceSyncState::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_device_sync_state_unique_device")
                    .table(DeviceSyncState::Table)
                    .col(DeviceSyncState::UserId)
                    .col(DeviceSyncState::DeviceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_device_sync_state_last_sync_time")
                    .table(DeviceSyncState::Table)
                    .col(DeviceSyncState::LastSyncTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventAck::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventAck::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EventAck::EventId).integer().not_null())
                    .col(ColumnDef::new(EventAck::UserId).integer().not_null())
                    .col(ColumnDef::new(EventAck::DeviceId).string().not_null())
                    .col(ColumnDef::new(EventAck::AckedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_ack_unique_membership")
                    .table(EventAck::Table)
                    .col(EventAck::EventId)
                    .col(EventAck::UserId)
                    .col(EventAck::DeviceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IngestError::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IngestError::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IngestError::Model).string().not_null())
                    .col(ColumnDef::new(IngestError::RecordId).integer().not_null())
                    .col(ColumnDef::new(IngestError::ErrorMessage).text().not_null())
                    .col(ColumnDef::new(IngestError::Timestamp).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ingest_error_model")
                    .table(IngestError::Table)
                    .col(IngestError::Model)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IngestError::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventAck::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DeviceSyncState::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChangeEvent::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ChangeEvent {
    Table,
    Id,
    Model,
    RecordId,
    Event,
    Timestamp,
    IsArchived,
    ArchiveDate,
    SyncedDeviceCount,
}

#[derive(DeriveIden)]
enum DeviceSyncState {
    Table,
    Id,
    UserId,
    DeviceId,
    AppType,
    LastEventId,
    LastSyncTime,
    SyncCount,
    IsActive,
}

#[derive(DeriveIden)]
enum EventAck {
    Table,
    Id,
    EventId,
    UserId,
    DeviceId,
    AckedAt,
}

#[derive(DeriveIden)]
enum IngestError {
    Table,
    Id,
    Model,
    RecordId,
    ErrorMessage,
    Timestamp,
}
