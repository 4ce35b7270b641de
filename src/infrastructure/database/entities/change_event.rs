//! Change event entity - the append-only, coalesced log of entity mutations

use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "change_event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Entity type name of the mutated record (e.g. "sale.order")
    #[sea_orm(indexed)]
    pub model: String,

    #[sea_orm(indexed)]
    pub record_id: i32,

    #[sea_orm(indexed)]
    pub event: EventKind,

    pub timestamp: DateTimeUtc,

    #[sea_orm(indexed)]
    pub is_archived: bool,

    /// Stamped when the event is archived; the purge clock starts here
    pub archive_date: Option<DateTimeUtc>,

    /// Cardinality of the per-device acknowledgment set for this event
    pub synced_device_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[sea_orm(string_value = "create")]
    Create,
    #[sea_orm(string_value = "write")]
    Write,
    #[sea_orm(string_value = "unlink")]
    Unlink,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            timestamp: Set(chrono::Utc::now()),
            is_archived: Set(false),
            synced_device_count: Set(0),
            ..ActiveModelTrait::default()
        }
    }
}
