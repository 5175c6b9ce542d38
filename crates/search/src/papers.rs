//! Direct paper search (spec.md §4.5.2).

use crate::engine::{distance_to_similarity, SearchEngine};
use litscout_common::db::{EntityId, EntityKind};
use litscout_common::errors::Result;
use litscout_common::metrics::SearchMetrics;

/// One nearest-neighbor hit against `paper_embeddings`, hydrated with the
/// metadata fields spec.md §4.5.2 lists.
#[derive(Debug, Clone)]
pub struct PaperHit {
    pub paper_id: i64,
    pub title: String,
    pub abstract_text: Option<String>,
    pub external_ids: serde_json::Value,
    pub source_id: Option<String>,
    pub distance: f64,
    pub similarity: f64,
}

/// Embeds `query` once and runs direct nearest-neighbor paper search,
/// paginated by `(limit, offset)`. An empty query returns an empty list
/// rather than an error (spec.md §7 kind 5).
pub async fn search_papers(
    engine: &SearchEngine,
    query: &str,
    limit: u64,
    offset: u64,
) -> Result<Vec<PaperHit>> {
    let metrics = SearchMetrics::start("papers");
    let Some(vector) = engine.embed_query(query).await? else {
        return Ok(Vec::new());
    };
    let hits = search_papers_with_vector(engine, &vector, limit, offset, None).await;
    metrics.finish();
    hits
}

/// Inner search reused by hybrid search's "missing paper-score" leg
/// (spec.md §4.5.5), which already holds a computed query vector and never
/// needs to re-embed or re-run the top-level metric.
pub(crate) async fn search_papers_with_vector(
    engine: &SearchEngine,
    query_vector: &[f32],
    limit: u64,
    offset: u64,
    restrict_ids: Option<&[i64]>,
) -> Result<Vec<PaperHit>> {
    let (_, probes) = engine.tuner.ensure_tuned(&engine.store, EntityKind::Paper).await?;
    let model_label = engine.model_label().to_string();

    let restrict: Option<Vec<EntityId>> =
        restrict_ids.map(|ids| ids.iter().map(|id| EntityId::Paper(*id)).collect());

    let ann_hits = engine
        .store
        .ann_search_restricted(
            EntityKind::Paper,
            query_vector,
            &model_label,
            limit,
            offset,
            probes,
            restrict.as_deref(),
        )
        .await?;

    if ann_hits.is_empty() {
        return Ok(Vec::new());
    }

    let paper_ids: Vec<i64> = ann_hits
        .iter()
        .filter_map(|hit| match &hit.entity_id {
            EntityId::Paper(id) => Some(*id),
            EntityId::Concept(_) => None,
        })
        .collect();
    let mut papers = engine.store.papers_by_ids(&paper_ids).await?;

    let mut out = Vec::with_capacity(ann_hits.len());
    for hit in ann_hits {
        let EntityId::Paper(id) = hit.entity_id else {
            continue;
        };
        let Some(paper) = papers.remove(&id) else {
            continue;
        };
        out.push(PaperHit {
            paper_id: paper.id,
            title: paper.title,
            abstract_text: paper.abstract_text,
            external_ids: paper.external_ids,
            source_id: paper.source_id,
            distance: hit.distance,
            similarity: distance_to_similarity(hit.distance),
        });
    }
    Ok(out)
}
