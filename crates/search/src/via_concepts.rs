//! Concept-mediated paper search (spec.md §4.5.4), and the shared
//! "concept-score" math hybrid search's missing-side computation reuses
//! (spec.md §4.5.5 step 2).

use crate::concepts::{search_concepts_with_vector, ConceptHit};
use crate::SearchEngine;
use litscout_common::errors::Result;
use litscout_common::metrics::SearchMetrics;
use std::collections::HashMap;

/// A paper matched under one concept, with its per-pair score
/// (`concept_similarity × concept_score_in_paper`).
#[derive(Debug, Clone)]
pub struct ConceptPaperHit {
    pub paper_id: i64,
    pub matching_score: f64,
}

/// One top concept plus the (at most `K_p`) papers matched under it —
/// carried through for explanation, per spec.md §4.5.4's "return both the
/// top concepts... and the paginated flat paper list."
#[derive(Debug, Clone)]
pub struct ConceptMatch {
    pub concept: ConceptHit,
    pub papers: Vec<ConceptPaperHit>,
}

/// A paper ranked by aggregated concept-mediated score.
#[derive(Debug, Clone)]
pub struct PaperAggregate {
    pub paper_id: i64,
    pub title: String,
    pub abstract_text: Option<String>,
    pub external_ids: serde_json::Value,
    pub source_id: Option<String>,
    pub total_score: f64,
}

#[derive(Debug, Clone)]
pub struct ViaConceptsResult {
    pub concepts: Vec<ConceptMatch>,
    pub papers: Vec<PaperAggregate>,
}

/// Embeds `query` once, finds the top `k_c` concepts, and aggregates
/// matched papers as spec.md §4.5.4 describes. `k_p` caps how many papers
/// are kept per matched concept before aggregation.
pub async fn search_papers_via_concepts(
    engine: &SearchEngine,
    query: &str,
    k_c: u64,
    k_p: u64,
    limit: u64,
    offset: u64,
) -> Result<ViaConceptsResult> {
    let metrics = SearchMetrics::start("via_concepts");
    let Some(vector) = engine.embed_query(query).await? else {
        return Ok(ViaConceptsResult {
            concepts: Vec::new(),
            papers: Vec::new(),
        });
    };

    let concept_hits = search_concepts_with_vector(engine, &vector, k_c, 0).await?;
    let (concepts, ranked) = via_concepts_ranked(engine, &concept_hits, k_c, k_p).await?;

    let papers = ranked
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    metrics.finish();
    Ok(ViaConceptsResult { concepts, papers })
}

/// Joins `concept_hits` against `papers.concepts`, truncates to the top
/// `k_p` papers per concept, and ranks every touched paper by
/// `total_score = Σ matching_score / k_c` — divided by the requested
/// concept count, not the number of concepts that actually matched
/// anything, which rewards papers covering more of the query's concepts
/// (spec.md §4.5.4 step 3).
///
/// Returns both the per-concept explanation groups and the fully-ranked
/// (unpaginated) paper list, so [`crate::hybrid`] can slice its own
/// top-N window out of the same computation without re-running the
/// concept ANN search.
pub(crate) async fn via_concepts_ranked(
    engine: &SearchEngine,
    concept_hits: &[ConceptHit],
    k_c: u64,
    k_p: u64,
) -> Result<(Vec<ConceptMatch>, Vec<PaperAggregate>)> {
    if concept_hits.is_empty() || k_c == 0 {
        return Ok((Vec::new(), Vec::new()));
    }

    let concept_ids: Vec<String> = concept_hits.iter().map(|c| c.concept_id.clone()).collect();
    let raw_matches = engine.store.papers_by_concepts(&concept_ids).await?;

    let mut by_concept: HashMap<&str, Vec<&litscout_common::db::ConceptPaperMatch>> = HashMap::new();
    for m in &raw_matches {
        by_concept.entry(m.concept_id.as_str()).or_default().push(m);
    }

    let mut concept_groups = Vec::with_capacity(concept_hits.len());
    let mut totals: HashMap<i64, f64> = HashMap::new();
    let mut papers_by_id: HashMap<i64, &litscout_common::db::ConceptPaperMatch> = HashMap::new();

    for hit in concept_hits {
        let mut matches = by_concept.remove(hit.concept_id.as_str()).unwrap_or_default();
        matches.sort_by(|a, b| {
            let score_a = hit.similarity * a.concept_score_in_paper;
            let score_b = hit.similarity * b.concept_score_in_paper;
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k_p.max(1) as usize);

        let mut group_papers = Vec::with_capacity(matches.len());
        for m in matches {
            let matching_score = hit.similarity * m.concept_score_in_paper;
            *totals.entry(m.paper_id).or_insert(0.0) += matching_score;
            papers_by_id.insert(m.paper_id, m);
            group_papers.push(ConceptPaperHit {
                paper_id: m.paper_id,
                matching_score,
            });
        }
        concept_groups.push(ConceptMatch {
            concept: hit.clone(),
            papers: group_papers,
        });
    }

    let mut ranked: Vec<PaperAggregate> = totals
        .into_iter()
        .filter_map(|(paper_id, sum)| {
            papers_by_id.get(&paper_id).map(|m| PaperAggregate {
                paper_id,
                title: m.paper_meta.title.clone(),
                abstract_text: m.paper_meta.abstract_text.clone(),
                external_ids: m.paper_meta.external_ids.clone(),
                source_id: m.paper_meta.source_id.clone(),
                total_score: sum / k_c as f64,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.total_score.partial_cmp(&a.total_score).unwrap_or(std::cmp::Ordering::Equal));

    Ok((concept_groups, ranked))
}

/// Pure scoring helper for hybrid search's missing-concept-score leg
/// (spec.md §4.5.5 step 2): given the query's top concepts (with their
/// already-known similarities) and a paper's raw `concepts` JSON blob,
/// sums `concept_similarity × paper_concept_score` over whichever of those
/// concepts the paper actually has, divided by `k_c`. No `K_p` truncation
/// here — that cap only governs which papers enter the ranked candidate
/// list, not the score of one already-identified paper.
pub(crate) fn concept_score_from_blob(
    concept_hits: &[ConceptHit],
    paper_concepts: &serde_json::Value,
    k_c: u64,
) -> f64 {
    if k_c == 0 {
        return 0.0;
    }
    let sum: f64 = concept_hits
        .iter()
        .filter_map(|hit| {
            paper_concepts
                .get(&hit.concept_id)
                .and_then(|entry| entry.get("score"))
                .and_then(|v| v.as_f64())
                .map(|score_in_paper| hit.similarity * score_in_paper)
        })
        .sum();
    sum / k_c as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, similarity: f64) -> ConceptHit {
        ConceptHit {
            concept_id: id.to_string(),
            name: id.to_string(),
            description: None,
            distance: 1.0 / similarity - 1.0,
            similarity,
        }
    }

    #[test]
    fn concept_score_sums_only_matched_concepts_and_divides_by_k_c() {
        let hits = vec![hit("C1", 0.8), hit("C2", 0.5)];
        let blob = json!({
            "C1": {"name": "x", "level": 1, "score": 0.5},
            "C3": {"name": "y", "level": 1, "score": 0.9},
        });
        // Only C1 matches: 0.8 * 0.5 = 0.4, divided by k_c=2.
        assert_eq!(concept_score_from_blob(&hits, &blob, 2), 0.2);
    }

    #[test]
    fn concept_score_is_zero_when_nothing_matches() {
        let hits = vec![hit("C1", 0.8)];
        let blob = json!({"C9": {"name": "z", "level": 1, "score": 0.5}});
        assert_eq!(concept_score_from_blob(&hits, &blob, 1), 0.0);
    }
}
