//! Ingestion error entity - the side channel for the fire-and-forget write path

use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingest_error")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub model: String,

    pub record_id: i32,

    #[sea_orm(column_type = "Text")]
    pub error_message: String,

    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            timestamp: Set(chrono::Utc::now()),
            ..ActiveModelTrait::default()
        }
    }
}
