//! Source (venue/publisher) enrichment: backfills `sources` rows referenced
//! by already-ingested papers (spec.md §4.3(c) **[SUPPLEMENT]**). Grounded
//! on `original_source/server/ingestion/openalex/fetch_sources.py:
//! ingest_sources_from_papers` and `ingest.py:_fetch_source_by_id`.

use crate::pool::{resolve_worker_count, run_bounded};
use litscout_common::errors::Result;
use litscout_common::Store;
use litscout_provider::{normalize_source, ProviderClient};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct SourceBatchResult {
    pub success: usize,
    pub failed: usize,
    pub failed_ids: Vec<(String, String)>,
}

/// Enumerates distinct `papers.source_id` values missing from `sources`,
/// chunks them by `batch_size`, and fetches+upserts each chunk in parallel
/// over the same bounded worker pool as concept ingestion.
#[instrument(skip(client, store, cancellation))]
pub async fn ingest_sources_from_papers(
    client: &ProviderClient,
    store: &Store,
    batch_size: usize,
    max_workers: Option<usize>,
    cancellation: CancellationToken,
) -> Result<SourceBatchResult> {
    let missing = store.missing_source_ids().await?;
    if missing.is_empty() {
        return Ok(SourceBatchResult::default());
    }

    let batch_size = batch_size.max(1);
    let worker_count = resolve_worker_count(max_workers).min(missing.len().max(1));

    let client = client.clone();
    let store = store.clone();
    let chunks: Vec<Vec<String>> = missing.chunks(batch_size).map(|c| c.to_vec()).collect();

    let results = run_bounded(chunks, worker_count, cancellation, move |chunk| {
        let client = client.clone();
        let store = store.clone();
        async move { ingest_source_chunk(&client, &store, chunk).await }
    })
    .await;

    let mut batch = SourceBatchResult::default();
    for chunk_result in results {
        batch.success += chunk_result.success;
        batch.failed += chunk_result.failed;
        batch.failed_ids.extend(chunk_result.failed_ids);
    }
    Ok(batch)
}

async fn ingest_source_chunk(
    client: &ProviderClient,
    store: &Store,
    source_ids: Vec<String>,
) -> SourceBatchResult {
    let mut batch = SourceBatchResult::default();
    for source_id in source_ids {
        match ingest_source(client, store, &source_id).await {
            Ok(()) => batch.success += 1,
            Err(e) => {
                warn!(source_id, error = %e, "failed to enrich source");
                batch.failed += 1;
                batch.failed_ids.push((source_id, e.to_string()));
            }
        }
    }
    batch
}

async fn ingest_source(client: &ProviderClient, store: &Store, source_id: &str) -> Result<()> {
    let raw = client.fetch_source(source_id).await?;
    store.upsert_source(normalize_source(&raw)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_result_accumulates() {
        let mut batch = SourceBatchResult::default();
        batch.success += 3;
        batch.failed += 1;
        batch.failed_ids.push(("S1".to_string(), "boom".to_string()));
        assert_eq!(batch.success, 3);
        assert_eq!(batch.failed_ids.len(), 1);
    }
}
