//! Per-process ANN index autotuner (spec.md §4.5.1).
//!
//! Grounded on `original_source/server/semantic/auto_index.py`
//! (`choose_ivfflat_lists`/`choose_probes` heuristics, the 1.5x
//! recreate-or-keep ratio) and `search.py`'s `_INDEX_TUNING` module-level
//! cache, replaced per design note (§9 "ANN autotune cache → one-shot
//! initializer") with a guarded one-shot per index kind instead of a
//! boolean-flag-plus-dict.

use litscout_common::db::{EntityKind, Store};
use litscout_common::errors::Result;
use litscout_common::metrics::record_ann_tune;
use tokio::sync::OnceCell;
use tracing::info;

/// `(lists, probes)` as chosen by the heuristic tables.
pub type IndexParams = (i64, u32);

fn choose_lists(row_count: u64) -> i64 {
    if row_count < 1_000 {
        50
    } else if row_count < 10_000 {
        100
    } else if row_count < 100_000 {
        200
    } else if row_count < 1_000_000 {
        1_000
    } else {
        2_000
    }
}

fn choose_probes(lists: i64) -> u32 {
    if lists <= 50 {
        5
    } else if lists <= 100 {
        10
    } else if lists <= 200 {
        20
    } else if lists <= 1_000 {
        50
    } else {
        100
    }
}

/// Caches `(lists, probes)` per entity kind for the lifetime of the
/// process. `ensure_tuned` runs the heuristic, and the create/drop-and-
/// recreate DDL, exactly once per kind; every subsequent call returns the
/// cached pair without touching the database again.
#[derive(Default)]
pub struct AnnTuner {
    paper: OnceCell<IndexParams>,
    concept: OnceCell<IndexParams>,
}

impl AnnTuner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ensure_tuned(&self, store: &Store, kind: EntityKind) -> Result<IndexParams> {
        let cell = match kind {
            EntityKind::Paper => &self.paper,
            EntityKind::Concept => &self.concept,
        };
        cell.get_or_try_init(|| tune(store, kind)).await.copied()
    }
}

/// Runs the heuristic once: counts rows, compares against any existing
/// index's `lists`, and creates/recreates the index when the two differ by
/// more than 1.5x in either direction (spec.md §4.5.1).
async fn tune(store: &Store, kind: EntityKind) -> Result<IndexParams> {
    let row_count = store.embeddings_row_count(kind).await?;
    if row_count == 0 {
        // No rows to build an IVFFLAT index against yet; fall back to the
        // smallest heuristic bucket without touching the schema
        // (`auto_index.py`'s empty-table short-circuit).
        return Ok((50, choose_probes(50)));
    }

    let desired_lists = choose_lists(row_count);
    let current_lists = store.ann_index_current_lists(kind).await?;

    let lists = match current_lists {
        None => {
            info!(?kind, lists = desired_lists, row_count, "creating ANN index");
            store.ensure_ann_index(kind, desired_lists).await?;
            record_ann_tune();
            desired_lists
        }
        Some(current) => {
            let ratio = if current == 0 {
                f64::INFINITY
            } else {
                (desired_lists.max(current) as f64) / (desired_lists.min(current) as f64)
            };
            if ratio > 1.5 {
                info!(
                    ?kind,
                    from = current,
                    to = desired_lists,
                    row_count,
                    "recreating ANN index: heuristic drifted past 1.5x"
                );
                store.drop_ann_index(kind).await?;
                store.ensure_ann_index(kind, desired_lists).await?;
                record_ann_tune();
                desired_lists
            } else {
                current
            }
        }
    };

    Ok((lists, choose_probes(lists)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_lists_matches_heuristic_table() {
        assert_eq!(choose_lists(0), 50);
        assert_eq!(choose_lists(999), 50);
        assert_eq!(choose_lists(1_000), 100);
        assert_eq!(choose_lists(9_999), 100);
        assert_eq!(choose_lists(10_000), 200);
        assert_eq!(choose_lists(99_999), 200);
        assert_eq!(choose_lists(100_000), 1_000);
        assert_eq!(choose_lists(999_999), 1_000);
        assert_eq!(choose_lists(1_000_000), 2_000);
    }

    #[test]
    fn choose_probes_matches_monotone_staircase() {
        assert_eq!(choose_probes(50), 5);
        assert_eq!(choose_probes(100), 10);
        assert_eq!(choose_probes(200), 20);
        assert_eq!(choose_probes(1_000), 50);
        assert_eq!(choose_probes(2_000), 100);
    }
}
