//! Author entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub full_name: String,

    #[sea_orm(column_type = "Text", nullable, unique)]
    pub orcid: Option<String>,

    /// Ordered sequence of institution records.
    #[sea_orm(column_type = "JsonBinary")]
    pub affiliations: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub last_known_institutions: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub topics: serde_json::Value,

    pub works_count: i64,

    pub cited_by_count: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub external_ids: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paper_author::Entity")]
    PaperAuthors,
}

impl Related<super::paper_author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaperAuthors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
