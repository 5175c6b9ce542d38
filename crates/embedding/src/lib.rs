//! Embedding pipeline: selects entities missing a vector for the configured
//! model label, builds their text, batches and encodes it, and writes the
//! result back (spec.md §4.4).

mod text;

pub use text::{build_concept_text, build_paper_text};

use litscout_common::db::{EntityId, EntityKind};
use litscout_common::errors::Result;
use litscout_common::{Embedder, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

const DEFAULT_BATCH_SIZE: usize = 64;
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_SECS: u64 = 2;

/// Result of one `embed_missing` run (spec.md §7's `EmbedBatchResult`).
#[derive(Debug, Clone, Default)]
pub struct EmbedBatchResult {
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Which entity kind to embed — mirrors `litscout_common::db::EntityKind`
/// but spelled out for the public CLI-facing surface (spec.md §6
/// `embed {papers,concepts}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Paper,
    Concept,
}

impl From<EmbedKind> for EntityKind {
    fn from(kind: EmbedKind) -> Self {
        match kind {
            EmbedKind::Paper => EntityKind::Paper,
            EmbedKind::Concept => EntityKind::Concept,
        }
    }
}

/// Embeds every `kind` entity with no row in its embeddings table for
/// `encoder.model_name()`, in batches of `batch_size` (default 64), capped
/// at `limit` rows total.
#[instrument(skip(store, encoder), fields(batch_size, model = encoder.model_name()))]
pub async fn embed_missing(
    store: &Store,
    encoder: Arc<dyn Embedder>,
    kind: EmbedKind,
    batch_size: Option<usize>,
    limit: Option<u64>,
) -> Result<EmbedBatchResult> {
    let batch_size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
    let model_label = encoder.model_name().to_string();
    let mut result = EmbedBatchResult::default();

    match kind {
        EmbedKind::Paper => {
            let papers = store.filter_unembedded_papers(&model_label, limit).await?;
            for chunk in papers.chunks(batch_size) {
                let mut ids = Vec::with_capacity(chunk.len());
                let mut texts = Vec::with_capacity(chunk.len());
                for paper in chunk {
                    match build_paper_text(paper) {
                        Some(text) => {
                            ids.push(EntityId::Paper(paper.id));
                            texts.push(text);
                        }
                        None => result.skipped += 1,
                    }
                }
                if texts.is_empty() {
                    continue;
                }
                embed_and_write(store, encoder.as_ref(), &model_label, ids, texts, &mut result).await;
            }
        }
        EmbedKind::Concept => {
            let concepts = store.filter_unembedded_concepts(&model_label, limit).await?;
            for chunk in concepts.chunks(batch_size) {
                let mut ids = Vec::with_capacity(chunk.len());
                let mut texts = Vec::with_capacity(chunk.len());
                for concept in chunk {
                    match build_concept_text(concept) {
                        Some(text) => {
                            ids.push(EntityId::Concept(concept.id.clone()));
                            texts.push(text);
                        }
                        None => result.skipped += 1,
                    }
                }
                if texts.is_empty() {
                    continue;
                }
                embed_and_write(store, encoder.as_ref(), &model_label, ids, texts, &mut result).await;
            }
        }
    }

    Ok(result)
}

/// Encodes one batch with up to `MAX_RETRIES` linear-backoff retries
/// (2s × attempt); on final failure the whole batch is skipped, not the
/// run aborted (spec.md §4.4, §7 kind 4).
async fn embed_and_write(
    store: &Store,
    encoder: &dyn Embedder,
    model_label: &str,
    ids: Vec<EntityId>,
    texts: Vec<String>,
    result: &mut EmbedBatchResult,
) {
    let kind = match ids.first() {
        Some(EntityId::Paper(_)) => EntityKind::Paper,
        Some(EntityId::Concept(_)) => EntityKind::Concept,
        None => return,
    };

    let mut attempt = 0u32;
    let vectors = loop {
        attempt += 1;
        match encoder.embed_batch(&texts).await {
            Ok(vectors) => break Some(vectors),
            Err(e) if attempt < MAX_RETRIES => {
                warn!(attempt, error = %e, "embedding batch failed, retrying");
                tokio::time::sleep(Duration::from_secs(RETRY_BACKOFF_SECS * attempt as u64)).await;
            }
            Err(e) => {
                warn!(attempt, error = %e, "embedding batch failed permanently, skipping batch");
                break None;
            }
        }
    };

    let Some(vectors) = vectors else {
        result.failed += texts.len();
        return;
    };

    if vectors.len() != ids.len() {
        warn!(
            expected = ids.len(),
            got = vectors.len(),
            "encoder returned a different number of vectors than texts, skipping batch"
        );
        result.failed += ids.len();
        return;
    }

    let rows: Vec<(EntityId, Vec<f32>)> = ids.into_iter().zip(vectors).collect();
    let written = rows.len();
    match store.insert_embeddings(kind, model_label, &rows).await {
        Ok(()) => result.embedded += written,
        Err(e) => {
            warn!(error = %e, "failed to write embedding batch");
            result.failed += written;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_kind_maps_to_entity_kind() {
        assert_eq!(EntityKind::from(EmbedKind::Paper), EntityKind::Paper);
        assert_eq!(EntityKind::from(EmbedKind::Concept), EntityKind::Concept);
    }
}
