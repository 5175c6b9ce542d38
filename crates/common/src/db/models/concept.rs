//! Concept entity
//!
//! Unlike most entities, `Concept.id` is the provider's short external id
//! string verbatim rather than an internal surrogate key — spec.md §3 types
//! it `[external id, e.g. "C41008148"]` directly, matching
//! `original_source/server/ingestion/db_writer.py:upsert_concept`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "concepts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    pub level: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub works_count: i64,

    pub cited_by_count: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub related_concepts: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
