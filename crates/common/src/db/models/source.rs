//! Source (venue/publisher) entity
//!
//! `Source.id` is the provider's short external id string, the same
//! exception as `Concept.id` (spec.md §3).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub source_type: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub host_organization_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub host_organization_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub issn_l: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub issn: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub country: Option<String>,

    pub is_oa: bool,

    pub is_in_doaj: bool,

    pub works_count: i64,

    pub cited_by_count: i64,

    #[sea_orm(column_type = "Text", nullable)]
    pub homepage_url: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paper::Entity")]
    Papers,
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Papers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
