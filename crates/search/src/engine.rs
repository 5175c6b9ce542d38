//! `SearchEngine`: the shared handle every search mode runs through.
//!
//! Grounded on the teacher's `crates/search/src/retrieval/mod.rs` `Retriever`
//! struct (owns the store handle plus the one thing specific to vector
//! search, here the encoder instead of a second pgvector client), and
//! `original_source/server/semantic/search.py`'s module-level
//! `_INDEX_TUNING` cache, reshaped per spec.md §4.5.1 into the explicit
//! [`crate::ann_tuner::AnnTuner`] owned alongside the store.

use crate::ann_tuner::AnnTuner;
use litscout_common::db::Store;
use litscout_common::errors::Result;
use litscout_common::Embedder;
use std::sync::Arc;

/// Default number of top concepts considered by concept-mediated search
/// (spec.md §4.5.4's `K_c`).
pub const DEFAULT_K_CONCEPTS: u64 = 10;

/// Default cap on papers kept per matched concept (spec.md §4.5.4's `K_p`).
pub const DEFAULT_K_PAPERS_PER_CONCEPT: u64 = 50;

/// Effective limit used by venue/author aggregation to approximate "search
/// over everything" without truly unbounded pagination (spec.md §4.5.6).
pub const AGGREGATE_CANDIDATE_LIMIT: u64 = 2_000;

/// `similarity = 1 / (1 + distance)` (spec.md §4.5.2), the monotone
/// transform shared by every mode that surfaces a user-facing score.
pub fn distance_to_similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Owns the store and encoder handle used by every search mode, plus the
/// per-process ANN autotune cache. One instance is built at process startup
/// and shared (by reference or `Arc`) across concurrent search requests —
/// search itself holds no per-request mutable state (spec.md §5).
pub struct SearchEngine {
    pub(crate) store: Store,
    pub(crate) encoder: Arc<dyn Embedder>,
    pub(crate) tuner: AnnTuner,
}

impl SearchEngine {
    pub fn new(store: Store, encoder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            encoder,
            tuner: AnnTuner::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn model_label(&self) -> &str {
        self.encoder.model_name()
    }

    /// Encodes a query string. An empty/whitespace-only query is a caller
    /// error (spec.md §7 kind 5) but is reported as `None` rather than
    /// `Err` — every search mode turns that into a structurally-empty
    /// result instead of propagating an error (spec.md §7: "search engine
    /// returns a structurally-empty result, does not propagate as an error
    /// to the caller").
    pub(crate) async fn embed_query(&self, query: &str) -> Result<Option<Vec<f32>>> {
        if query.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(self.encoder.embed(query).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_monotone_decreasing_in_distance() {
        let close = distance_to_similarity(0.1);
        let far = distance_to_similarity(2.0);
        assert!(close > far);
        assert!(close <= 1.0 && close > 0.0);
    }

    #[test]
    fn zero_distance_is_unit_similarity() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
    }
}
