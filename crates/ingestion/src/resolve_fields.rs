//! Field-name → concept-id resolution (spec.md §4.3(a)).
//!
//! spec.md's literal text ("top-1 per field by works_count, deduplicated")
//! is authoritative over
//! `original_source/server/ingestion/openalex/fetch_concepts.py`, which
//! fetches up to `per_field_limit` (default 500) candidates per field. This
//! repository keeps only the top candidate per field, while retaining the
//! source's cross-field dedup-keep-max-works_count rule, since the two do
//! not conflict: a field can still resolve to a concept another field also
//! resolved to (resolved Open Question, `DESIGN.md`).

use litscout_common::errors::Result;
use litscout_provider::{ConceptCandidate, ProviderClient};
use std::collections::HashMap;

pub async fn resolve_concepts_for_fields(
    client: &ProviderClient,
    fields: &[String],
) -> Result<Vec<ConceptCandidate>> {
    let mut best: HashMap<String, ConceptCandidate> = HashMap::new();

    for field in fields {
        let candidates = client.fetch_concepts(field).await?;
        // The provider sorts by works_count desc; the first result is the
        // field's top-1 candidate.
        let Some(top) = candidates.into_iter().next() else {
            tracing::warn!(field, "no concept candidates resolved for field");
            continue;
        };

        best.entry(top.id.clone())
            .and_modify(|existing| {
                if top.works_count > existing.works_count {
                    *existing = top.clone();
                }
            })
            .or_insert(top);
    }

    Ok(best.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_the_higher_works_count() {
        let mut best: HashMap<String, ConceptCandidate> = HashMap::new();
        let a = ConceptCandidate {
            id: "C1".to_string(),
            name: "AI".to_string(),
            description: None,
            works_count: 100,
        };
        let b = ConceptCandidate {
            id: "C1".to_string(),
            name: "AI".to_string(),
            description: None,
            works_count: 500,
        };
        best.insert(a.id.clone(), a);
        best.entry(b.id.clone())
            .and_modify(|existing| {
                if b.works_count > existing.works_count {
                    *existing = b.clone();
                }
            })
            .or_insert(b);
        assert_eq!(best["C1"].works_count, 500);
    }
}
