//! Device sync state entity - one watermark row per (user, device) pair

use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_sync_state")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub user_id: i32,

    /// Caller-supplied device identifier (e.g. "mobile-android-abc123")
    #[sea_orm(indexed)]
    pub device_id: String,

    /// Declared app category, stored as its wire string (e.g. "sales_app")
    pub app_type: String,

    /// Highest event id this device has consumed; 0 means never synced
    pub last_event_id: i32,

    #[sea_orm(indexed)]
    pub last_sync_time: DateTimeUtc,

    pub sync_count: i32,

    /// Inactive devices do not count toward the archival activity window
    #[sea_orm(indexed)]
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            last_event_id: Set(0),
            last_sync_time: Set(chrono::Utc::now()),
            sync_count: Set(0),
            is_active: Set(true),
            ..ActiveModelTrait::default()
        }
    }
}
