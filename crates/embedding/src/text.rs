//! Embedding text construction (spec.md §4.4), grounded on
//! `original_source/server/embeddings/papers.py:_build_paper_text`.

use litscout_common::db::models::{Concept, Paper};

/// `title ⊕ abstract`, joined by blank lines. `None` when both are empty.
///
/// spec.md's text also names a `"Conclusion: " + conclusion` segment, but
/// the data model (spec.md §3) carries no `conclusion` attribute on
/// `Paper` — the distilled entity only keeps `title`/`abstract`/etc. This
/// segment is therefore never populated here (resolved Open Question,
/// `DESIGN.md`); the construction degrades gracefully to title+abstract.
pub fn build_paper_text(paper: &Paper) -> Option<String> {
    let parts: Vec<&str> = [paper.title.as_str(), paper.abstract_text.as_deref().unwrap_or("")]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// `name ⊕ description`.
pub fn build_concept_text(concept: &Concept) -> Option<String> {
    let parts: Vec<&str> = [
        concept.name.as_str(),
        concept.description.as_deref().unwrap_or(""),
    ]
    .into_iter()
    .filter(|s| !s.trim().is_empty())
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_paper(title: &str, abstract_text: Option<&str>) -> Paper {
        Paper {
            id: 1,
            title: title.to_string(),
            abstract_text: abstract_text.map(str::to_string),
            year: None,
            publication_date: None,
            doi: None,
            field: None,
            language: None,
            referenced_works: json!([]),
            concepts: json!({}),
            external_ids: json!({}),
            source_id: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn paper_text_joins_title_and_abstract() {
        let paper = sample_paper("Deep Learning", Some("A survey."));
        assert_eq!(
            build_paper_text(&paper),
            Some("Deep Learning\n\nA survey.".to_string())
        );
    }

    #[test]
    fn paper_text_none_when_all_empty() {
        let paper = sample_paper("", None);
        assert_eq!(build_paper_text(&paper), None);
    }

    #[test]
    fn paper_text_uses_title_alone_when_abstract_missing() {
        let paper = sample_paper("Deep Learning", None);
        assert_eq!(build_paper_text(&paper), Some("Deep Learning".to_string()));
    }
}
