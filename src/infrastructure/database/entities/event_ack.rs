//! Per-device event acknowledgment set
//!
//! Acknowledgment is set membership: the unique index over
//! (event_id, user_id, device_id) makes a repeated ack from the same device
//! a no-op instead of a double count.

use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_ack")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub event_id: i32,

    pub user_id: i32,

    pub device_id: String,

    pub acked_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            acked_at: Set(chrono::Utc::now()),
            ..ActiveModelTrait::default()
        }
    }
}
