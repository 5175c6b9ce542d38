//! Per-concept ingestion task: fetches works, normalizes, and upserts.
//! Grounded on `original_source/server/ingestion/openalex/ingest.py:
//! ingest_openalex_concept` for the per-work / per-page / cursor control
//! flow, and `crates/ingestion/src/processor.rs` for the
//! `#[instrument(skip(...), fields(...))]` logging style.

use litscout_common::errors::{AppError, Result};
use litscout_common::Store;
use litscout_provider::{normalize_concept, normalize_work, ProviderClient};
use std::collections::HashSet;
use tracing::{instrument, warn};

/// Result of `ingest_concepts_by_fields`/a multi-concept batch: spec.md
/// §4.3's `{success, failed, failed_ids}`.
#[derive(Debug, Clone, Default)]
pub struct IngestBatchResult {
    pub success: usize,
    pub failed: usize,
    pub failed_ids: Vec<(String, String)>,
}

/// Ingests every work for `concept_id`, up to `max_pages`. Returns the
/// number of papers written. The `IngestedConcept` cursor is advanced once
/// per page, immediately after that page's works are written, so a crash
/// mid-run re-ingests at most one page (upsert-by-key makes this safe).
#[instrument(skip(client, store), fields(concept_id))]
pub async fn ingest_concept(
    client: &ProviderClient,
    store: &Store,
    concept_id: &str,
    max_pages: usize,
) -> Result<usize> {
    let mut cursor = client.works_for_concept(concept_id, max_pages);
    let mut seen_concepts: HashSet<String> = HashSet::new();
    let mut papers_ingested = 0usize;
    let mut pages_ingested = 0i32;

    while let Some(works) = cursor.next_page().await? {
        for raw in &works {
            match ingest_one_work(client, store, raw, &mut seen_concepts).await {
                Ok(()) => papers_ingested += 1,
                Err(e) => warn!(concept_id, error = %e, "failed to ingest work, skipping"),
            }
        }

        pages_ingested += 1;
        let txn = store.begin_tx().await?;
        store
            .mark_concept_ingested(&txn, concept_id, pages_ingested)
            .await?;
        txn.commit().await.map_err(AppError::from)?;
    }

    Ok(papers_ingested)
}

/// Upserts one work's paper, authors, and author associations. Concepts
/// referenced by the paper that are not yet known are resolved via the
/// provider's generic entity fetch (spec.md §6) *before* the work's own
/// transaction opens, since they require their own provider round-trip;
/// `seen_concepts` caches hits within this task to avoid refetching the
/// same concept across every paper in the concept's own work listing.
///
/// The paper row, its author rows, and their associations are then written
/// in a single transaction (spec.md §4.1: "a crash leaves either the whole
/// work ingested or none of it") — a failure partway through rolls back
/// the paper write too, rather than leaving an author-less paper behind.
async fn ingest_one_work(
    client: &ProviderClient,
    store: &Store,
    raw: &serde_json::Value,
    seen_concepts: &mut HashSet<String>,
) -> Result<()> {
    let work = normalize_work(raw);

    if let Some(concepts) = work.paper.concepts.as_object() {
        for concept_id in concepts.keys() {
            if seen_concepts.contains(concept_id) {
                continue;
            }
            if store.concept_exists(concept_id).await? {
                seen_concepts.insert(concept_id.clone());
                continue;
            }
            match client.fetch_entity(concept_id).await {
                Ok(raw_concept) => {
                    store.upsert_concept(normalize_concept(&raw_concept)).await?;
                    seen_concepts.insert(concept_id.clone());
                }
                Err(e) => warn!(concept_id, error = %e, "failed to resolve referenced concept"),
            }
        }
    }

    let txn = store.begin_tx().await?;
    let paper = store.upsert_paper_on(&txn, work.paper).await?;

    for author_ref in work.authors {
        let author = store.upsert_author_on(&txn, author_ref.author).await?;
        store
            .insert_paper_author_on(
                &txn,
                paper.id,
                author.id,
                author_ref.order,
                author_ref.is_corresponding,
            )
            .await?;
    }

    txn.commit().await.map_err(AppError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_result_defaults_to_empty() {
        let batch = IngestBatchResult::default();
        assert_eq!(batch.success, 0);
        assert_eq!(batch.failed, 0);
        assert!(batch.failed_ids.is_empty());
    }
}
