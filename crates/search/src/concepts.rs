//! Concept search (spec.md §4.5.3): same shape as direct paper search but
//! against `concept_embeddings`.

use crate::engine::{distance_to_similarity, SearchEngine};
use litscout_common::db::{EntityId, EntityKind};
use litscout_common::errors::Result;
use litscout_common::metrics::SearchMetrics;

#[derive(Debug, Clone)]
pub struct ConceptHit {
    pub concept_id: String,
    pub name: String,
    pub description: Option<String>,
    pub distance: f64,
    pub similarity: f64,
}

pub async fn search_concepts(
    engine: &SearchEngine,
    query: &str,
    limit: u64,
    offset: u64,
) -> Result<Vec<ConceptHit>> {
    let metrics = SearchMetrics::start("concepts");
    let Some(vector) = engine.embed_query(query).await? else {
        return Ok(Vec::new());
    };
    let hits = search_concepts_with_vector(engine, &vector, limit, offset).await;
    metrics.finish();
    hits
}

/// Inner search reused by concept-mediated paper search (spec.md §4.5.4),
/// which needs the raw concept hits before they're joined against papers.
pub(crate) async fn search_concepts_with_vector(
    engine: &SearchEngine,
    query_vector: &[f32],
    limit: u64,
    offset: u64,
) -> Result<Vec<ConceptHit>> {
    let (_, probes) = engine
        .tuner
        .ensure_tuned(&engine.store, EntityKind::Concept)
        .await?;
    let model_label = engine.model_label().to_string();

    let ann_hits = engine
        .store
        .ann_search(EntityKind::Concept, query_vector, &model_label, limit, offset, probes)
        .await?;

    if ann_hits.is_empty() {
        return Ok(Vec::new());
    }

    let concept_ids: Vec<String> = ann_hits
        .iter()
        .filter_map(|hit| match &hit.entity_id {
            EntityId::Concept(id) => Some(id.clone()),
            EntityId::Paper(_) => None,
        })
        .collect();
    let mut concepts = engine.store.concepts_by_ids(&concept_ids).await?;

    let mut out = Vec::with_capacity(ann_hits.len());
    for hit in ann_hits {
        let EntityId::Concept(id) = hit.entity_id else {
            continue;
        };
        let Some(concept) = concepts.remove(&id) else {
            continue;
        };
        out.push(ConceptHit {
            concept_id: concept.id,
            name: concept.name,
            description: concept.description,
            distance: hit.distance,
            similarity: distance_to_similarity(hit.distance),
        });
    }
    Ok(out)
}
