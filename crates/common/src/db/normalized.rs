//! Normalized DTOs passed from `litscout-provider`'s normalizer into the
//! `Store`'s upsert methods.
//!
//! Per design note (§9 "dynamic JSON blobs → typed sum variants"), these are
//! the narrow records downstream code operates on — nothing past
//! normalization should see a raw provider JSON value.

use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct NormalizedPaper {
    pub doi: Option<String>,
    pub title: String,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub publication_date: Option<DateTime<Utc>>,
    pub field: Option<String>,
    pub language: Option<String>,
    pub referenced_works: Vec<String>,
    /// Mapping concept-id -> {name, level, score}.
    pub concepts: Value,
    /// Mapping namespace -> id, contains "openalex" when sourced from there.
    pub external_ids: Value,
    pub source_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizedAuthor {
    pub orcid: Option<String>,
    pub full_name: String,
    pub affiliations: Value,
    pub last_known_institutions: Value,
    pub topics: Value,
    pub works_count: i64,
    pub cited_by_count: i64,
    pub external_ids: Value,
}

#[derive(Debug, Clone)]
pub struct NormalizedConcept {
    pub id: String,
    pub name: String,
    pub level: i32,
    pub description: Option<String>,
    pub works_count: i64,
    pub cited_by_count: i64,
    pub related_concepts: Value,
}

#[derive(Debug, Clone)]
pub struct NormalizedSource {
    pub id: String,
    pub name: String,
    pub source_type: Option<String>,
    pub host_organization_id: Option<String>,
    pub host_organization_name: Option<String>,
    pub issn_l: Option<String>,
    pub issn: Value,
    pub country: Option<String>,
    pub is_oa: bool,
    pub is_in_doaj: bool,
    pub works_count: i64,
    pub cited_by_count: i64,
    pub homepage_url: Option<String>,
}
