//! Author search (spec.md §4.5.7): aggregates the concept-mediated
//! candidate set by author, with a configurable per-paper share policy.

use crate::engine::AGGREGATE_CANDIDATE_LIMIT;
use crate::via_concepts::search_papers_via_concepts;
use crate::SearchEngine;
use litscout_common::errors::Result;
use litscout_common::metrics::SearchMetrics;
use std::cmp::Ordering;
use std::collections::HashMap;

/// How a paper's `total_score` is split across its authors. spec.md §4.5.7
/// states this is "a policy knob" with `Equal` as the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorSharePolicy {
    #[default]
    Equal,
    OrderWeighted,
}

#[derive(Debug, Clone)]
pub struct AuthorHit {
    pub author_id: i64,
    pub full_name: String,
    pub aggregate_score: f64,
    pub contributing_paper_ids: Vec<i64>,
}

/// Runs concept-mediated search over a large candidate pool (not hybrid —
/// spec.md §4.5.7 says "the same concept-mediated candidate set"), splits
/// each paper's `total_score` across its authors per `policy`, and sums the
/// shares per author.
#[allow(clippy::too_many_arguments)]
pub async fn search_authors(
    engine: &SearchEngine,
    query: &str,
    k_c: u64,
    k_p: u64,
    policy: AuthorSharePolicy,
    limit: u64,
    offset: u64,
) -> Result<Vec<AuthorHit>> {
    let metrics = SearchMetrics::start("authors");
    let candidates =
        search_papers_via_concepts(engine, query, k_c, k_p, AGGREGATE_CANDIDATE_LIMIT, 0).await?;

    let paper_ids: Vec<i64> = candidates.papers.iter().map(|p| p.paper_id).collect();
    let paper_score: HashMap<i64, f64> =
        candidates.papers.iter().map(|p| (p.paper_id, p.total_score)).collect();

    let associations = engine.store.paper_authors_for_papers(&paper_ids).await?;
    let mut by_paper: HashMap<i64, Vec<(i64, i32)>> = HashMap::new();
    for assoc in &associations {
        by_paper
            .entry(assoc.paper_id)
            .or_default()
            .push((assoc.author_id, assoc.author_order));
    }

    let mut aggregate: HashMap<i64, f64> = HashMap::new();
    let mut contributing: HashMap<i64, Vec<i64>> = HashMap::new();

    for (paper_id, authors) in &by_paper {
        let Some(&score) = paper_score.get(paper_id) else {
            continue;
        };
        if authors.is_empty() {
            continue;
        }
        let shares = author_shares(authors, policy);
        for (author_id, share) in shares {
            *aggregate.entry(author_id).or_insert(0.0) += score * share;
            contributing.entry(author_id).or_default().push(*paper_id);
        }
    }

    let author_ids: Vec<i64> = aggregate.keys().copied().collect();
    let authors = engine.store.authors_by_ids(&author_ids).await?;

    let mut ranked: Vec<AuthorHit> = aggregate
        .into_iter()
        .filter_map(|(author_id, aggregate_score)| {
            let full_name = authors.get(&author_id)?.full_name.clone();
            Some(AuthorHit {
                contributing_paper_ids: contributing.remove(&author_id).unwrap_or_default(),
                author_id,
                full_name,
                aggregate_score,
            })
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

/// Returns `(author_id, share)` pairs for one paper's author list, summing
/// to 1.0 across the paper's authors.
fn author_shares(authors: &[(i64, i32)], policy: AuthorSharePolicy) -> Vec<(i64, f64)> {
    match policy {
        AuthorSharePolicy::Equal => {
            let share = 1.0 / authors.len() as f64;
            authors.iter().map(|(id, _)| (*id, share)).collect()
        }
        AuthorSharePolicy::OrderWeighted => {
            let weights: Vec<f64> = authors
                .iter()
                .map(|(_, order)| 1.0 / (*order).max(1) as f64)
                .collect();
            let total: f64 = weights.iter().sum();
            authors
                .iter()
                .zip(weights)
                .map(|((id, _), w)| (*id, if total > 0.0 { w / total } else { 0.0 }))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_share_splits_evenly() {
        let shares = author_shares(&[(1, 1), (2, 2), (3, 3)], AuthorSharePolicy::Equal);
        for (_, share) in &shares {
            assert!((share - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn order_weighted_favors_first_author() {
        let shares = author_shares(&[(1, 1), (2, 2)], AuthorSharePolicy::OrderWeighted);
        let first = shares.iter().find(|(id, _)| *id == 1).unwrap().1;
        let second = shares.iter().find(|(id, _)| *id == 2).unwrap().1;
        assert!(first > second);
        assert!((first + second - 1.0).abs() < 1e-9);
    }
}
