//! Venue/source search (spec.md §4.5.6): hybrid search over a large
//! candidate pool, aggregated by `source_id`.

use crate::engine::AGGREGATE_CANDIDATE_LIMIT;
use crate::hybrid::search_hybrid;
use crate::SearchEngine;
use litscout_common::errors::Result;
use litscout_common::metrics::SearchMetrics;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct VenueHit {
    pub source_id: String,
    pub name: String,
    pub aggregate_score: f64,
    pub contributing_paper_ids: Vec<i64>,
}

/// Runs hybrid search with an oversized effective limit so the aggregation
/// sees a broad candidate pool, then sums `combined_score` per distinct
/// `source_id` (spec.md §4.5.6). Papers with no `source_id` don't
/// contribute to any venue.
#[allow(clippy::too_many_arguments)]
pub async fn search_venues(
    engine: &SearchEngine,
    query: &str,
    weight_paper: f64,
    weight_concept: f64,
    k_c: u64,
    k_p: u64,
    limit: u64,
    offset: u64,
) -> Result<Vec<VenueHit>> {
    let metrics = SearchMetrics::start("venues");
    let candidates = search_hybrid(
        engine,
        query,
        weight_paper,
        weight_concept,
        k_c,
        k_p,
        AGGREGATE_CANDIDATE_LIMIT,
        0,
    )
    .await?;

    let mut aggregate: HashMap<String, f64> = HashMap::new();
    let mut paper_ids: HashMap<String, Vec<i64>> = HashMap::new();
    for hit in &candidates {
        let Some(source_id) = &hit.source_id else {
            continue;
        };
        *aggregate.entry(source_id.clone()).or_insert(0.0) += hit.combined_score;
        paper_ids.entry(source_id.clone()).or_default().push(hit.paper_id);
    }

    let source_ids: Vec<String> = aggregate.keys().cloned().collect();
    let sources = engine.store.sources_by_ids(&source_ids).await?;

    // A `source_id` a paper points to may not have an enriched `sources` row
    // yet (source enrichment is a separate, later step — spec.md §4.3(c));
    // fall back to the bare id rather than dropping the venue from results.
    let mut ranked: Vec<VenueHit> = aggregate
        .into_iter()
        .map(|(source_id, aggregate_score)| {
            let name = sources
                .get(&source_id)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| source_id.clone());
            VenueHit {
                contributing_paper_ids: paper_ids.remove(&source_id).unwrap_or_default(),
                source_id,
                name,
                aggregate_score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.aggregate_score
            .partial_cmp(&a.aggregate_score)
            .unwrap_or(Ordering::Equal)
    });

    let page = ranked
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    metrics.finish();
    Ok(page)
}
