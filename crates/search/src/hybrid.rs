//! Hybrid search (spec.md §4.5.5): combines direct paper search (§4.5.2)
//! and concept-mediated search (§4.5.4) into one weighted ranking.

use crate::concepts::search_concepts_with_vector;
use crate::engine::SearchEngine;
use crate::papers::search_papers_with_vector;
use crate::via_concepts::{concept_score_from_blob, via_concepts_ranked};
use crate::weights::normalize_weights;
use litscout_common::errors::Result;
use litscout_common::metrics::SearchMetrics;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct PaperMeta {
    title: String,
    abstract_text: Option<String>,
    external_ids: serde_json::Value,
    source_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HybridHit {
    pub paper_id: i64,
    pub title: String,
    pub abstract_text: Option<String>,
    pub external_ids: serde_json::Value,
    pub source_id: Option<String>,
    pub paper_score: f64,
    pub concept_score: f64,
    pub combined_score: f64,
}

/// Runs both legs off a single query embedding, fills in whichever side is
/// missing a score for papers found only by the other leg, combines with
/// renormalized weights, and paginates (spec.md §4.5.5).
#[allow(clippy::too_many_arguments)]
pub async fn search_hybrid(
    engine: &SearchEngine,
    query: &str,
    weight_paper: f64,
    weight_concept: f64,
    k_c: u64,
    k_p: u64,
    limit: u64,
    offset: u64,
) -> Result<Vec<HybridHit>> {
    let metrics = SearchMetrics::start("hybrid");
    let Some(vector) = engine.embed_query(query).await? else {
        return Ok(Vec::new());
    };

    let n = offset + limit;
    let (w_p, w_c) = normalize_weights(weight_paper, weight_concept);

    let direct_hits = search_papers_with_vector(engine, &vector, n, 0, None).await?;
    let concept_hits = search_concepts_with_vector(engine, &vector, k_c, 0).await?;
    let (_, via_ranked) = via_concepts_ranked(engine, &concept_hits, k_c, k_p).await?;
    let via_top_n: Vec<_> = via_ranked.into_iter().take(n.max(1) as usize).collect();

    let mut meta: HashMap<i64, PaperMeta> = HashMap::new();
    let mut paper_score: HashMap<i64, f64> = HashMap::new();
    let mut concept_score: HashMap<i64, f64> = HashMap::new();

    for hit in &direct_hits {
        meta.insert(
            hit.paper_id,
            PaperMeta {
                title: hit.title.clone(),
                abstract_text: hit.abstract_text.clone(),
                external_ids: hit.external_ids.clone(),
                source_id: hit.source_id.clone(),
            },
        );
        paper_score.insert(hit.paper_id, hit.similarity);
    }
    for agg in &via_top_n {
        meta.entry(agg.paper_id).or_insert_with(|| PaperMeta {
            title: agg.title.clone(),
            abstract_text: agg.abstract_text.clone(),
            external_ids: agg.external_ids.clone(),
            source_id: agg.source_id.clone(),
        });
        concept_score.insert(agg.paper_id, agg.total_score);
    }

    let union_ids: Vec<i64> = meta.keys().copied().collect();

    let missing_paper_ids: Vec<i64> = union_ids
        .iter()
        .copied()
        .filter(|id| !paper_score.contains_key(id))
        .collect();
    if !missing_paper_ids.is_empty() {
        let hits = search_papers_with_vector(
            engine,
            &vector,
            missing_paper_ids.len() as u64,
            0,
            Some(missing_paper_ids.as_slice()),
        )
        .await?;
        for hit in hits {
            paper_score.insert(hit.paper_id, hit.similarity);
            meta.entry(hit.paper_id).or_insert_with(|| PaperMeta {
                title: hit.title,
                abstract_text: hit.abstract_text,
                external_ids: hit.external_ids,
                source_id: hit.source_id,
            });
        }
    }

    let missing_concept_ids: Vec<i64> = union_ids
        .iter()
        .copied()
        .filter(|id| !concept_score.contains_key(id))
        .collect();
    if !missing_concept_ids.is_empty() && !concept_hits.is_empty() {
        let blobs = engine.store.papers_concepts_blob(&missing_concept_ids).await?;
        for id in &missing_concept_ids {
            let score = blobs
                .get(id)
                .map(|blob| concept_score_from_blob(&concept_hits, blob, k_c))
                .unwrap_or(0.0);
            concept_score.insert(*id, score);
        }
    }

    let mut combined: Vec<HybridHit> = union_ids
        .into_iter()
        .filter_map(|id| {
            let m = meta.get(&id)?;
            let ps = paper_score.get(&id).copied().unwrap_or(0.0);
            let cs = concept_score.get(&id).copied().unwrap_or(0.0);
            Some(HybridHit {
                paper_id: id,
                title: m.title.clone(),
                abstract_text: m.abstract_text.clone(),
                external_ids: m.external_ids.clone(),
                source_id: m.source_id.clone(),
                paper_score: ps,
                concept_score: cs,
                combined_score: w_p * ps + w_c * cs,
            })
        })
        .collect();

    combined.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(Ordering::Equal)
    });

    let page = combined
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    metrics.finish();
    Ok(page)
}
