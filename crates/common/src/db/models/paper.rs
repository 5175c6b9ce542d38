//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_name = "abstract", column_type = "Text", nullable)]
    pub abstract_text: Option<String>,

    pub year: Option<i32>,

    pub publication_date: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable, unique)]
    pub doi: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub field: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub language: Option<String>,

    /// Ordered sequence of external ids of referenced works.
    #[sea_orm(column_type = "JsonBinary")]
    pub referenced_works: serde_json::Value,

    /// Mapping concept-id -> {name, level, score}.
    #[sea_orm(column_type = "JsonBinary")]
    pub concepts: serde_json::Value,

    /// Mapping namespace -> id, must contain "openalex" when applicable.
    #[sea_orm(column_type = "JsonBinary")]
    pub external_ids: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub source_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paper_author::Entity")]
    PaperAuthors,

    #[sea_orm(
        belongs_to = "super::source::Entity",
        from = "Column::SourceId",
        to = "super::source::Column::Id"
    )]
    Source,
}

impl Related<super::paper_author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaperAuthors.def()
    }
}

impl Related<super::source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Source.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
