//! LitScout ingestion pipeline: field→concept resolution, bounded-concurrency
//! work ingestion, and source enrichment (spec.md §4.3).

mod pipeline;
mod pool;
mod resolve_fields;
mod sources;

pub use pipeline::{ingest_concept, IngestBatchResult};
pub use pool::resolve_worker_count;
pub use resolve_fields::resolve_concepts_for_fields;
pub use sources::{ingest_sources_from_papers, SourceBatchResult};

use litscout_common::Store;
use litscout_provider::ProviderClient;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Ingests works for every concept resolved from `fields`
/// (`litscout_ingestion::ingest_concepts_by_fields`, spec.md §6's
/// `ingest openalex-multi`). Resolves fields, optionally filters concepts
/// already ingested, then runs `ingest_concept` across a bounded worker
/// pool (cap 8, spec.md §4.3).
///
/// `cancellation` lets a caller (e.g. the CLI reacting to Ctrl-C) stop
/// submitting new concept tasks; concept tasks already running are left to
/// finish their current page's transaction (spec.md §5).
#[instrument(skip(client, store, fields, cancellation), fields(field_count = fields.len()))]
pub async fn ingest_concepts_by_fields(
    client: &ProviderClient,
    store: &Store,
    fields: &[String],
    pages: usize,
    skip_existing: bool,
    max_workers: Option<usize>,
    cancellation: CancellationToken,
) -> litscout_common::Result<IngestBatchResult> {
    store.ensure_ingestion_schema().await?;

    let candidates = resolve_concepts_for_fields(client, fields).await?;
    let mut concept_ids: Vec<String> = candidates.into_iter().map(|c| c.id).collect();

    if skip_existing {
        let already = store.ingested_concept_ids().await?;
        let already: std::collections::HashSet<_> = already.into_iter().collect();
        concept_ids.retain(|id| !already.contains(id));
    }

    let worker_count = resolve_worker_count(max_workers).min(concept_ids.len().max(1));

    let client = client.clone();
    let store = store.clone();
    let results = pool::run_bounded(concept_ids, worker_count, cancellation, move |concept_id| {
        let client = client.clone();
        let store = store.clone();
        async move {
            let outcome = pipeline::ingest_concept(&client, &store, &concept_id, pages).await;
            (concept_id, outcome)
        }
    })
    .await;

    let mut batch = IngestBatchResult::default();
    for (concept_id, outcome) in results {
        match outcome {
            Ok(n) => {
                batch.success += n;
                tracing::info!(concept_id, papers_ingested = n, "concept ingested");
            }
            Err(e) => {
                tracing::warn!(concept_id, error = %e, "concept ingestion failed");
                batch.failed += 1;
                batch.failed_ids.push((concept_id, e.to_string()));
            }
        }
    }
    Ok(batch)
}
