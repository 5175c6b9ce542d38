//! Provider JSON → internal data model, grounded on
//! `original_source/server/ingestion/openalex/normalizer.py`.

use chrono::{NaiveDate, TimeZone, Utc};
use litscout_common::db::normalized::{NormalizedAuthor, NormalizedConcept, NormalizedPaper, NormalizedSource};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::client::ConceptCandidate;

/// One reference to an author within a work, in authorship order.
#[derive(Debug, Clone)]
pub struct NormalizedAuthorRef {
    pub author: NormalizedAuthor,
    pub order: i32,
    pub is_corresponding: bool,
}

/// A fully normalized work: the paper row plus its ordered author list.
#[derive(Debug, Clone)]
pub struct NormalizedWork {
    pub paper: NormalizedPaper,
    pub authors: Vec<NormalizedAuthorRef>,
}

/// Shortens a full provider URL id (`https://openalex.org/W123`) to its
/// trailing segment (`W123`). Already-short ids pass through unchanged.
pub fn shorten_id(raw: &str) -> String {
    raw.rsplit('/').next().unwrap_or(raw).to_string()
}

/// Decodes OpenAlex's inverted-index abstract representation
/// (`{"word": [position, ...], ...}`) into a space-joined string, or `None`
/// when absent/empty.
fn reconstruct_abstract(inverted_index: Option<&Value>) -> Option<String> {
    let obj = inverted_index?.as_object()?;
    if obj.is_empty() {
        return None;
    }

    let max_pos = obj
        .values()
        .filter_map(Value::as_array)
        .flat_map(|positions| positions.iter().filter_map(Value::as_u64))
        .max()? as usize;

    let mut tokens: Vec<Option<&str>> = vec![None; max_pos + 1];
    for (word, positions) in obj {
        if let Some(positions) = positions.as_array() {
            for pos in positions.iter().filter_map(Value::as_u64) {
                tokens[pos as usize] = Some(word.as_str());
            }
        }
    }

    let joined = tokens.into_iter().flatten().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Whitespace-collapses a title, falling back to `"(untitled)"` when empty
/// (spec.md §4.2).
fn normalize_title(raw: Option<&str>) -> String {
    let collapsed = raw
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.is_empty() {
        "(untitled)".to_string()
    } else {
        collapsed
    }
}

/// Builds the per-paper `concepts` JSON map (id -> {name, level, score}),
/// dropping non-positive scores and keeping the higher-scoring occurrence on
/// id collision (invariant #2, spec.md §3).
///
/// Returns the map alongside the `primary_field` name: the max-score
/// concept's `display_name`, a literal reading of spec.md §3 rather than
/// the source's positional `concepts[0]` (resolved Open Question,
/// `DESIGN.md`).
fn normalize_concepts(raw_concepts: &[Value]) -> (Value, Option<String>) {
    let mut by_id: HashMap<String, (String, i64, f64)> = HashMap::new();

    for c in raw_concepts {
        let score = c.get("score").and_then(Value::as_f64).unwrap_or(0.0);
        if score <= 0.0 {
            continue;
        }
        let id = c
            .get("id")
            .and_then(Value::as_str)
            .map(shorten_id)
            .unwrap_or_default();
        if id.is_empty() {
            continue;
        }
        let name = c
            .get("display_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let level = c.get("level").and_then(Value::as_i64).unwrap_or(0);

        by_id
            .entry(id)
            .and_modify(|existing| {
                if score > existing.2 {
                    *existing = (name.clone(), level, score);
                }
            })
            .or_insert((name, level, score));
    }

    let primary_field = by_id
        .values()
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(name, _, _)| name.clone());

    let map = json!(by_id
        .into_iter()
        .map(|(id, (name, level, score))| (id, json!({"name": name, "level": level, "score": score})))
        .collect::<serde_json::Map<_, _>>());

    (map, primary_field)
}

fn parse_publication_date(raw: Option<&str>) -> Option<chrono::DateTime<Utc>> {
    let raw = raw?;
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn normalize_author(raw_author: &Value) -> NormalizedAuthor {
    let orcid = raw_author
        .get("orcid")
        .and_then(Value::as_str)
        .map(shorten_id);
    let full_name = raw_author
        .get("display_name")
        .and_then(Value::as_str)
        .unwrap_or("(unknown author)")
        .to_string();
    let openalex_id = raw_author
        .get("id")
        .and_then(Value::as_str)
        .map(shorten_id)
        .unwrap_or_default();

    NormalizedAuthor {
        orcid,
        full_name,
        affiliations: raw_author.get("affiliations").cloned().unwrap_or(Value::Null),
        last_known_institutions: raw_author
            .get("last_known_institutions")
            .cloned()
            .unwrap_or(Value::Null),
        topics: raw_author.get("topics").cloned().unwrap_or(Value::Null),
        works_count: raw_author.get("works_count").and_then(Value::as_i64).unwrap_or(0),
        cited_by_count: raw_author
            .get("cited_by_count")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        external_ids: json!({"openalex": openalex_id}),
    }
}

/// Normalizes a single OpenAlex "work" into a paper row and its ordered
/// author list (`original_source/.../normalizer.py:normalize_openalex_work`).
pub fn normalize_work(raw: &Value) -> NormalizedWork {
    let title = normalize_title(raw.get("title").and_then(Value::as_str));
    let abstract_text = reconstruct_abstract(raw.get("abstract_inverted_index"));

    let raw_concepts = raw
        .get("concepts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let (concepts, primary_field) = normalize_concepts(&raw_concepts);

    let referenced_works = raw
        .get("referenced_works")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(shorten_id)
                .collect()
        })
        .unwrap_or_default();

    let doi = raw
        .get("doi")
        .and_then(Value::as_str)
        .map(|d| d.trim_start_matches("https://doi.org/").to_string());

    let openalex_id = raw
        .get("id")
        .and_then(Value::as_str)
        .map(shorten_id)
        .unwrap_or_default();

    let source_id = raw
        .get("primary_location")
        .and_then(|loc| loc.get("source"))
        .and_then(|s| s.get("id"))
        .and_then(Value::as_str)
        .map(shorten_id);

    let publication_date = raw
        .get("publication_date")
        .and_then(Value::as_str)
        .and_then(|d| parse_publication_date(Some(d)));

    let paper = NormalizedPaper {
        doi,
        title,
        abstract_text,
        year: raw.get("publication_year").and_then(Value::as_i64).map(|y| y as i32),
        publication_date,
        field: primary_field,
        language: raw
            .get("language")
            .and_then(Value::as_str)
            .map(str::to_string),
        referenced_works,
        concepts,
        external_ids: json!({"openalex": openalex_id}),
        source_id,
    };

    let authors = raw
        .get("authorships")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .enumerate()
                .map(|(idx, authorship)| {
                    let author = authorship
                        .get("author")
                        .map(normalize_author)
                        .unwrap_or_else(|| normalize_author(&Value::Null));
                    let is_corresponding = authorship
                        .get("is_corresponding")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    NormalizedAuthorRef {
                        author,
                        order: idx as i32 + 1,
                        is_corresponding,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    NormalizedWork { paper, authors }
}

/// Normalizes a full OpenAlex concept entity (fetched by id — spec.md §6's
/// generic fetcher — when a work references a concept not yet resolved via
/// field search) into a `NormalizedConcept`.
pub fn normalize_concept(raw: &Value) -> NormalizedConcept {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .map(shorten_id)
        .unwrap_or_default();

    NormalizedConcept {
        id,
        name: raw
            .get("display_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        level: raw.get("level").and_then(Value::as_i64).unwrap_or(0) as i32,
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        works_count: raw.get("works_count").and_then(Value::as_i64).unwrap_or(0),
        cited_by_count: raw.get("cited_by_count").and_then(Value::as_i64).unwrap_or(0),
        related_concepts: raw.get("related_concepts").cloned().unwrap_or(Value::Null),
    }
}

pub(crate) fn concept_candidate_from_raw(raw: &Value) -> ConceptCandidate {
    ConceptCandidate {
        id: raw
            .get("id")
            .and_then(Value::as_str)
            .map(shorten_id)
            .unwrap_or_default(),
        name: raw
            .get("display_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        works_count: raw.get("works_count").and_then(Value::as_i64).unwrap_or(0),
    }
}

/// Normalizes a full OpenAlex source entity
/// (`original_source/.../ingest.py:_fetch_source_by_id`).
pub fn normalize_source(raw: &Value) -> NormalizedSource {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .map(shorten_id)
        .unwrap_or_default();

    NormalizedSource {
        id,
        name: raw
            .get("display_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        source_type: raw.get("type").and_then(Value::as_str).map(str::to_string),
        host_organization_id: raw
            .get("host_organization")
            .and_then(Value::as_str)
            .map(shorten_id),
        host_organization_name: raw
            .get("host_organization_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        issn_l: raw.get("issn_l").and_then(Value::as_str).map(str::to_string),
        issn: raw.get("issn").cloned().unwrap_or(Value::Null),
        country: raw
            .get("country_code")
            .and_then(Value::as_str)
            .map(str::to_string),
        is_oa: raw.get("is_oa").and_then(Value::as_bool).unwrap_or(false),
        is_in_doaj: raw.get("is_in_doaj").and_then(Value::as_bool).unwrap_or(false),
        works_count: raw.get("works_count").and_then(Value::as_i64).unwrap_or(0),
        cited_by_count: raw.get("cited_by_count").and_then(Value::as_i64).unwrap_or(0),
        homepage_url: raw
            .get("homepage_url")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorten_id_takes_trailing_segment() {
        assert_eq!(shorten_id("https://openalex.org/W123"), "W123");
        assert_eq!(shorten_id("C41008148"), "C41008148");
    }

    #[test]
    fn reconstruct_abstract_joins_by_position() {
        let inv = json!({"Deep": [0], "learning": [1], "is": [2], "great": [3]});
        assert_eq!(
            reconstruct_abstract(Some(&inv)),
            Some("Deep learning is great".to_string())
        );
    }

    #[test]
    fn reconstruct_abstract_none_when_absent() {
        assert_eq!(reconstruct_abstract(None), None);
        assert_eq!(reconstruct_abstract(Some(&json!({}))), None);
    }

    #[test]
    fn normalize_title_collapses_whitespace_and_falls_back() {
        assert_eq!(normalize_title(Some("  A   Title  ")), "A Title");
        assert_eq!(normalize_title(Some("")), "(untitled)");
        assert_eq!(normalize_title(None), "(untitled)");
    }

    #[test]
    fn normalize_concepts_drops_nonpositive_scores_and_dedups_keeping_max() {
        let raw = vec![
            json!({"id": "https://openalex.org/C1", "display_name": "AI", "level": 1, "score": 0.9}),
            json!({"id": "https://openalex.org/C2", "display_name": "Bio", "level": 0, "score": 0.0}),
            json!({"id": "https://openalex.org/C1", "display_name": "AI", "level": 1, "score": 0.4}),
        ];
        let (map, primary_field) = normalize_concepts(&raw);
        let obj = map.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["C1"]["score"].as_f64(), Some(0.9));
        assert_eq!(primary_field, Some("AI".to_string()));
    }

    #[test]
    fn normalize_work_falls_back_on_missing_fields() {
        let raw = json!({
            "id": "https://openalex.org/W1",
            "title": "",
            "concepts": [],
            "authorships": [],
        });
        let normalized = normalize_work(&raw);
        assert_eq!(normalized.paper.title, "(untitled)");
        assert_eq!(normalized.paper.external_ids["openalex"], "W1");
        assert!(normalized.authors.is_empty());
    }
}
