//! `Store`: the single data-access façade every pipeline goes through.
//!
//! Grounded on `crates/common/src/db/repository.rs`'s `Repository` pattern
//! (typed sea-orm lookups for plain columns, raw `Statement::from_sql_and_values`
//! for anything jsonb/pgvector-shaped sea-orm cannot express) and
//! `original_source/server/ingestion/db_writer.py` for the conflict policy:
//! match by strongest key, then merge JSON / `COALESCE` rather than overwrite.

use crate::db::models::*;
use crate::db::normalized::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, Set, Statement, TransactionTrait,
};
use std::collections::HashMap;

/// Which embeddings table an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Paper,
    Concept,
}

impl EntityKind {
    fn embeddings_table(&self) -> &'static str {
        match self {
            EntityKind::Paper => "paper_embeddings",
            EntityKind::Concept => "concept_embeddings",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Paper => "paper_id",
            EntityKind::Concept => "concept_id",
        }
    }

    /// Deterministic IVFFLAT index name, matching
    /// `original_source/server/semantic/auto_index.py`'s
    /// `{PAPER,CONCEPT}_INDEX_NAME` constants.
    fn ann_index_name(&self) -> &'static str {
        match self {
            EntityKind::Paper => "idx_paper_embeddings_vec_ivfflat",
            EntityKind::Concept => "idx_concept_embeddings_vec_ivfflat",
        }
    }

    fn vector_column(&self) -> &'static str {
        "embedding_vec"
    }
}

/// An entity id carried through embedding rows and ANN hits: `i64` for
/// papers, `String` for concepts — `Concept.id` has no numeric surrogate
/// (spec.md §3 exception).
#[derive(Debug, Clone, PartialEq)]
pub enum EntityId {
    Paper(i64),
    Concept(String),
}

impl EntityId {
    fn to_value(&self) -> sea_orm::Value {
        match self {
            EntityId::Paper(id) => (*id).into(),
            EntityId::Concept(id) => id.clone().into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnHit {
    pub entity_id: EntityId,
    pub distance: f64,
}

/// One `(paper, concept)` match produced by `papers_by_concepts`.
#[derive(Debug, Clone)]
pub struct ConceptPaperMatch {
    pub paper_id: i64,
    pub concept_id: String,
    pub concept_score_in_paper: f64,
    pub paper_meta: Paper,
}

#[derive(Clone)]
pub struct Store {
    pool: DbPool,
}

impl Store {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Starts a transaction; callers group a paper's rows (paper, authors,
    /// concept associations, cursor update) into one (spec.md §4.1).
    pub async fn begin_tx(&self) -> Result<sea_orm::DatabaseTransaction> {
        self.conn().begin().await.map_err(AppError::from)
    }

    /// Creates the ingestion-cursor table if absent. Called once up front,
    /// outside the worker pool, to avoid concurrent DDL (spec.md §4.3,
    /// `original_source/.../ingest.py:ensure_openalex_tracking_table_global`).
    pub async fn ensure_ingestion_schema(&self) -> Result<()> {
        self.conn()
            .execute_unprepared(
                r#"
                CREATE TABLE IF NOT EXISTS openalex_ingested_concepts (
                    concept_id TEXT PRIMARY KEY,
                    pages_ingested INTEGER NOT NULL DEFAULT 0,
                    last_ingested_at TIMESTAMPTZ NOT NULL
                )
                "#,
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Paper
    // ------------------------------------------------------------------

    /// Match by DOI, else by `external_ids.openalex`, else insert fresh.
    /// On a hit, JSON maps are merged (`||`, right side wins on key
    /// collision) and source linkage is only filled in when previously null
    /// (invariant #3).
    pub async fn upsert_paper(&self, p: NormalizedPaper) -> Result<Paper> {
        self.upsert_paper_on(self.conn(), p).await
    }

    /// Same as `upsert_paper` but runs on a caller-supplied connection —
    /// a `DatabaseTransaction` when the caller needs this grouped with
    /// sibling writes (spec.md §4.1: paper + authors + associations +
    /// cursor update as one per-work transaction).
    pub async fn upsert_paper_on(
        &self,
        conn: &impl ConnectionTrait,
        p: NormalizedPaper,
    ) -> Result<Paper> {
        let now = Utc::now();

        let existing_id = match &p.doi {
            Some(doi) => {
                PaperEntity::find()
                    .filter(PaperColumn::Doi.eq(doi.clone()))
                    .one(conn)
                    .await?
                    .map(|m| m.id)
            }
            None => None,
        };

        let existing_id = match existing_id {
            Some(id) => Some(id),
            None => match p.external_ids.get("openalex").and_then(|v| v.as_str()) {
                Some(openalex_id) => find_paper_id_by_openalex(conn, openalex_id).await?,
                None => None,
            },
        };

        match existing_id {
            Some(id) => update_paper(conn, id, p, now).await,
            None => insert_paper(conn, p, now).await,
        }
    }

    pub async fn papers_by_concepts(
        &self,
        concept_ids: &[String],
    ) -> Result<Vec<ConceptPaperMatch>> {
        if concept_ids.is_empty() {
            return Ok(Vec::new());
        }

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT p.id, p.title, "abstract", p.year, p.publication_date, p.doi, p.field,
                   p.language, p.referenced_works, p.concepts, p.external_ids, p.source_id,
                   p.created_at, p.updated_at, kv.key AS concept_id,
                   (kv.value ->> 'score')::float8 AS concept_score
            FROM papers p, jsonb_each(p.concepts) AS kv
            WHERE kv.key = ANY($1)
            "#,
            vec![concept_ids.to_vec().into()],
        );

        let rows = self.conn().query_all(stmt).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let paper_meta = row_to_paper(&row)?;
            let concept_id: String = row
                .try_get_by("concept_id")
                .map_err(|e| AppError::internal(e.to_string()))?;
            let concept_score_in_paper: f64 = row
                .try_get_by("concept_score")
                .map_err(|e| AppError::internal(e.to_string()))?;
            out.push(ConceptPaperMatch {
                paper_id: paper_meta.id,
                concept_id,
                concept_score_in_paper,
                paper_meta,
            });
        }
        Ok(out)
    }

    pub async fn papers_concepts_blob(
        &self,
        paper_ids: &[i64],
    ) -> Result<HashMap<i64, serde_json::Value>> {
        if paper_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT id, concepts FROM papers WHERE id = ANY($1)",
            vec![paper_ids.to_vec().into()],
        );
        let rows = self.conn().query_all(stmt).await?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row
                .try_get_by_index(0)
                .map_err(|e| AppError::internal(e.to_string()))?;
            let concepts: serde_json::Value = row
                .try_get_by_index(1)
                .map_err(|e| AppError::internal(e.to_string()))?;
            out.insert(id, concepts);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Author
    // ------------------------------------------------------------------

    pub async fn upsert_author(&self, a: NormalizedAuthor) -> Result<Author> {
        self.upsert_author_on(self.conn(), a).await
    }

    /// Same as `upsert_author` but runs on a caller-supplied connection
    /// (see `upsert_paper_on`).
    pub async fn upsert_author_on(
        &self,
        conn: &impl ConnectionTrait,
        a: NormalizedAuthor,
    ) -> Result<Author> {
        let now = Utc::now();

        let existing_id = match &a.orcid {
            Some(orcid) => {
                AuthorEntity::find()
                    .filter(AuthorColumn::Orcid.eq(orcid.clone()))
                    .one(conn)
                    .await?
                    .map(|m| m.id)
            }
            None => None,
        };

        let existing_id = match existing_id {
            Some(id) => Some(id),
            None => match a.external_ids.get("openalex").and_then(|v| v.as_str()) {
                Some(openalex_id) => {
                    let stmt = Statement::from_sql_and_values(
                        DbBackend::Postgres,
                        "SELECT id FROM authors WHERE external_ids ->> 'openalex' = $1",
                        vec![openalex_id.into()],
                    );
                    conn.query_one(stmt)
                        .await?
                        .and_then(|r| r.try_get_by_index::<i64>(0).ok())
                }
                None => None,
            },
        };

        match existing_id {
            Some(id) => {
                let mut am: AuthorActiveModel = AuthorEntity::find_by_id(id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| AppError::internal("author vanished mid-upsert"))?
                    .into();
                am.full_name = Set(a.full_name);
                am.affiliations = Set(a.affiliations);
                am.last_known_institutions = Set(a.last_known_institutions);
                am.topics = Set(a.topics);
                am.works_count = Set(a.works_count);
                am.cited_by_count = Set(a.cited_by_count);
                am.updated_at = Set(now.into());
                am.update(conn).await.map_err(AppError::from)
            }
            None => {
                let am = AuthorActiveModel {
                    full_name: Set(a.full_name),
                    orcid: Set(a.orcid),
                    affiliations: Set(a.affiliations),
                    last_known_institutions: Set(a.last_known_institutions),
                    topics: Set(a.topics),
                    works_count: Set(a.works_count),
                    cited_by_count: Set(a.cited_by_count),
                    external_ids: Set(a.external_ids),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                am.insert(conn).await.map_err(AppError::from)
            }
        }
    }

    // ------------------------------------------------------------------
    // Concept / Source (id is the provider's own string, upsert by PK)
    // ------------------------------------------------------------------

    pub async fn upsert_concept(&self, c: NormalizedConcept) -> Result<Concept> {
        self.upsert_concept_on(self.conn(), c).await
    }

    /// Same as `upsert_concept` but runs on a caller-supplied connection
    /// (see `upsert_paper_on`).
    pub async fn upsert_concept_on(
        &self,
        conn: &impl ConnectionTrait,
        c: NormalizedConcept,
    ) -> Result<Concept> {
        let now = Utc::now();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO concepts (id, name, level, description, works_count, cited_by_count,
                                   related_concepts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                level = EXCLUDED.level,
                description = EXCLUDED.description,
                works_count = EXCLUDED.works_count,
                cited_by_count = EXCLUDED.cited_by_count,
                related_concepts = EXCLUDED.related_concepts,
                updated_at = EXCLUDED.updated_at
            "#,
            vec![
                c.id.clone().into(),
                c.name.into(),
                c.level.into(),
                c.description.into(),
                c.works_count.into(),
                c.cited_by_count.into(),
                c.related_concepts.into(),
                now.naive_utc().into(),
            ],
        );
        conn.execute(stmt).await?;

        ConceptEntity::find_by_id(c.id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::internal("concept vanished mid-upsert"))
    }

    pub async fn upsert_source(&self, s: NormalizedSource) -> Result<Source> {
        let now = Utc::now();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO sources (id, name, source_type, host_organization_id,
                                  host_organization_name, issn_l, issn, country, is_oa,
                                  is_in_doaj, works_count, cited_by_count, homepage_url,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                source_type = EXCLUDED.source_type,
                host_organization_id = EXCLUDED.host_organization_id,
                host_organization_name = EXCLUDED.host_organization_name,
                issn_l = EXCLUDED.issn_l,
                issn = EXCLUDED.issn,
                country = EXCLUDED.country,
                is_oa = EXCLUDED.is_oa,
                is_in_doaj = EXCLUDED.is_in_doaj,
                works_count = EXCLUDED.works_count,
                cited_by_count = EXCLUDED.cited_by_count,
                homepage_url = EXCLUDED.homepage_url,
                updated_at = EXCLUDED.updated_at
            "#,
            vec![
                s.id.clone().into(),
                s.name.into(),
                s.source_type.into(),
                s.host_organization_id.into(),
                s.host_organization_name.into(),
                s.issn_l.into(),
                s.issn.into(),
                s.country.into(),
                s.is_oa.into(),
                s.is_in_doaj.into(),
                s.works_count.into(),
                s.cited_by_count.into(),
                s.homepage_url.into(),
                now.naive_utc().into(),
            ],
        );
        self.conn().execute(stmt).await?;

        SourceEntity::find_by_id(s.id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::internal("source vanished mid-upsert"))
    }

    // ------------------------------------------------------------------
    // PaperAuthor / IngestedConcept
    // ------------------------------------------------------------------

    pub async fn insert_paper_author(
        &self,
        paper_id: i64,
        author_id: i64,
        author_order: i32,
        is_corresponding: bool,
    ) -> Result<()> {
        self.insert_paper_author_on(self.conn(), paper_id, author_id, author_order, is_corresponding)
            .await
    }

    /// Same as `insert_paper_author` but runs on a caller-supplied
    /// connection (see `upsert_paper_on`).
    pub async fn insert_paper_author_on(
        &self,
        conn: &impl ConnectionTrait,
        paper_id: i64,
        author_id: i64,
        author_order: i32,
        is_corresponding: bool,
    ) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO paper_authors (paper_id, author_id, author_order, is_corresponding)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (paper_id, author_id) DO UPDATE SET
                author_order = EXCLUDED.author_order,
                is_corresponding = EXCLUDED.is_corresponding
            "#,
            vec![
                paper_id.into(),
                author_id.into(),
                author_order.into(),
                is_corresponding.into(),
            ],
        );
        conn.execute(stmt).await?;
        Ok(())
    }

    /// Upserts the ingestion cursor in the caller's transaction, so it lands
    /// atomically with the last page's writes (spec.md §4.3).
    pub async fn mark_concept_ingested(
        &self,
        txn: &impl ConnectionTrait,
        concept_id: &str,
        pages_ingested: i32,
    ) -> Result<()> {
        let now = Utc::now();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO openalex_ingested_concepts (concept_id, pages_ingested, last_ingested_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (concept_id) DO UPDATE SET
                pages_ingested = EXCLUDED.pages_ingested,
                last_ingested_at = EXCLUDED.last_ingested_at
            "#,
            vec![
                concept_id.into(),
                pages_ingested.into(),
                now.naive_utc().into(),
            ],
        );
        txn.execute(stmt).await?;
        Ok(())
    }

    pub async fn ingested_concept_ids(&self) -> Result<Vec<String>> {
        let rows = IngestedConceptEntity::find().all(self.conn()).await?;
        Ok(rows.into_iter().map(|r| r.concept_id).collect())
    }

    pub async fn get_ingested_concept(&self, concept_id: &str) -> Result<Option<IngestedConcept>> {
        IngestedConceptEntity::find_by_id(concept_id.to_string())
            .one(self.conn())
            .await
            .map_err(AppError::from)
    }

    pub async fn concept_exists(&self, concept_id: &str) -> Result<bool> {
        Ok(ConceptEntity::find_by_id(concept_id.to_string())
            .one(self.conn())
            .await?
            .is_some())
    }

    /// Distinct `papers.source_id` values absent from `sources`, feeding
    /// source enrichment (spec.md §4.3 **[SUPPLEMENT]**,
    /// `original_source/.../fetch_sources.py:ingest_sources_from_papers`).
    pub async fn missing_source_ids(&self) -> Result<Vec<String>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT DISTINCT p.source_id FROM papers p
            LEFT JOIN sources s ON s.id = p.source_id
            WHERE p.source_id IS NOT NULL AND s.id IS NULL
            "#,
            vec![],
        );
        let rows = self.conn().query_all(stmt).await?;
        rows.iter()
            .map(|r| {
                r.try_get_by_index::<String>(0)
                    .map_err(|e| AppError::internal(e.to_string()))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Embeddings
    // ------------------------------------------------------------------

    /// Entities with no row in the embeddings table for `model_label`,
    /// ordered by stable id ascending (spec.md §4.4, left-anti-join).
    pub async fn filter_unembedded_papers(
        &self,
        model_label: &str,
        limit: Option<u64>,
    ) -> Result<Vec<Paper>> {
        let sql = format!(
            r#"
            SELECT p.* FROM papers p
            LEFT JOIN paper_embeddings e ON e.paper_id = p.id AND e.model_name = $1
            WHERE e.paper_id IS NULL
            ORDER BY p.id ASC
            {}
            "#,
            limit.map(|l| format!("LIMIT {l}")).unwrap_or_default()
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, vec![model_label.into()]);
        let rows = self.conn().query_all(stmt).await?;
        rows.iter().map(row_to_paper).collect()
    }

    pub async fn filter_unembedded_concepts(
        &self,
        model_label: &str,
        limit: Option<u64>,
    ) -> Result<Vec<Concept>> {
        let sql = format!(
            r#"
            SELECT c.* FROM concepts c
            LEFT JOIN concept_embeddings e ON e.concept_id = c.id AND e.model_name = $1
            WHERE e.concept_id IS NULL
            ORDER BY c.id ASC
            {}
            "#,
            limit.map(|l| format!("LIMIT {l}")).unwrap_or_default()
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, vec![model_label.into()]);
        let rows = self.conn().query_all(stmt).await?;
        rows.iter().map(row_to_concept).collect()
    }

    /// Upserts `(entity_id, model_label, vector, now)`, conflict on
    /// `(entity_id, model_label)` updating vector + timestamp.
    pub async fn insert_embeddings(
        &self,
        kind: EntityKind,
        model_label: &str,
        rows: &[(EntityId, Vec<f32>)],
    ) -> Result<()> {
        let table = kind.embeddings_table();
        let id_col = kind.id_column();
        let now = Utc::now();

        for (entity_id, vector) in rows {
            let vector_str = vector_literal(vector);
            let sql = format!(
                r#"
                INSERT INTO {table} ({id_col}, model_name, embedding_vec, created_at)
                VALUES ($1, $2, $3::vector, $4)
                ON CONFLICT ({id_col}, model_name) DO UPDATE SET
                    embedding_vec = EXCLUDED.embedding_vec,
                    created_at = EXCLUDED.created_at
                "#
            );
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![
                    entity_id.to_value(),
                    model_label.into(),
                    vector_str.into(),
                    now.naive_utc().into(),
                ],
            );
            self.conn().execute(stmt).await?;
        }
        Ok(())
    }

    /// Nearest-neighbor lookup. Must run inside a transaction so the
    /// session-local `probes` override applies to the SELECT (spec.md
    /// §4.1, §4.5.1).
    pub async fn ann_search(
        &self,
        kind: EntityKind,
        query_vector: &[f32],
        model_label: &str,
        k: u64,
        offset: u64,
        probes: u32,
    ) -> Result<Vec<AnnHit>> {
        self.ann_search_restricted(kind, query_vector, model_label, k, offset, probes, None)
            .await
    }

    /// Like `ann_search` but restricted to a specific id set — used by
    /// hybrid search's "missing side" lookups (spec.md §4.5.5).
    pub async fn ann_search_restricted(
        &self,
        kind: EntityKind,
        query_vector: &[f32],
        model_label: &str,
        k: u64,
        offset: u64,
        probes: u32,
        restrict_ids: Option<&[EntityId]>,
    ) -> Result<Vec<AnnHit>> {
        let table = kind.embeddings_table();
        let id_col = kind.id_column();
        let vector_str = vector_literal(query_vector);

        let restrict_clause = restrict_ids
            .map(|_| format!("AND {id_col} = ANY($5)"))
            .unwrap_or_default();

        let sql = format!(
            r#"
            SELECT {id_col} AS entity_id, embedding_vec <-> $1::vector AS distance
            FROM {table}
            WHERE model_name = $2
            {restrict_clause}
            ORDER BY distance ASC
            LIMIT $3 OFFSET $4
            "#
        );

        let mut values: Vec<sea_orm::Value> =
            vec![vector_str.into(), model_label.into(), (k as i64).into(), (offset as i64).into()];
        if let Some(ids) = restrict_ids {
            values.push(ids_to_array_value(kind, ids));
        }

        let txn = self.begin_tx().await?;
        crate::db::DbPool::set_local_probes(&txn, probes).await?;
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let rows = txn.query_all(stmt).await?;
        txn.commit().await.map_err(AppError::from)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let distance: f64 = row
                .try_get_by("distance")
                .map_err(|e| AppError::internal(e.to_string()))?;
            let entity_id = match kind {
                EntityKind::Paper => EntityId::Paper(
                    row.try_get_by("entity_id")
                        .map_err(|e| AppError::internal(e.to_string()))?,
                ),
                EntityKind::Concept => EntityId::Concept(
                    row.try_get_by("entity_id")
                        .map_err(|e| AppError::internal(e.to_string()))?,
                ),
            };
            hits.push(AnnHit { entity_id, distance });
        }
        Ok(hits)
    }

    /// Row count backing the ANN autotuner's heuristic (spec.md §4.5.1).
    pub async fn embeddings_row_count(&self, kind: EntityKind) -> Result<u64> {
        let table = kind.embeddings_table();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            format!("SELECT COUNT(*) AS n FROM {table}"),
            vec![],
        );
        let row = self
            .conn()
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::internal("count query returned no row"))?;
        let n: i64 = row
            .try_get_by("n")
            .map_err(|e| AppError::internal(e.to_string()))?;
        Ok(n as u64)
    }

    // ------------------------------------------------------------------
    // Bulk metadata fetch — the search engine's hit-hydration step
    // ------------------------------------------------------------------

    pub async fn papers_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Paper>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = PaperEntity::find()
            .filter(PaperColumn::Id.is_in(ids.to_vec()))
            .all(self.conn())
            .await?;
        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }

    pub async fn concepts_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Concept>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = ConceptEntity::find()
            .filter(ConceptColumn::Id.is_in(ids.to_vec()))
            .all(self.conn())
            .await?;
        Ok(rows.into_iter().map(|c| (c.id.clone(), c)).collect())
    }

    pub async fn sources_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Source>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = SourceEntity::find()
            .filter(SourceColumn::Id.is_in(ids.to_vec()))
            .all(self.conn())
            .await?;
        Ok(rows.into_iter().map(|s| (s.id.clone(), s)).collect())
    }

    pub async fn authors_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Author>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = AuthorEntity::find()
            .filter(AuthorColumn::Id.is_in(ids.to_vec()))
            .all(self.conn())
            .await?;
        Ok(rows.into_iter().map(|a| (a.id, a)).collect())
    }

    /// Every `(paper, author)` association for a set of papers — feeds
    /// author-aggregation search (spec.md §4.5.7).
    pub async fn paper_authors_for_papers(&self, paper_ids: &[i64]) -> Result<Vec<PaperAuthor>> {
        if paper_ids.is_empty() {
            return Ok(Vec::new());
        }
        PaperAuthorEntity::find()
            .filter(PaperAuthorColumn::PaperId.is_in(paper_ids.to_vec()))
            .all(self.conn())
            .await
            .map_err(AppError::from)
    }

    // ------------------------------------------------------------------
    // ANN index DDL / introspection (spec.md §4.5.1)
    // ------------------------------------------------------------------

    /// `lists` the live index was built with, or `None` if no such index
    /// exists. Mirrors `original_source/server/semantic/auto_index.py:
    /// _get_current_lists`'s `pg_class`/`pg_index` `reloptions` regex.
    pub async fn ann_index_current_lists(&self, kind: EntityKind) -> Result<Option<i64>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT reloptions FROM pg_class c
            JOIN pg_index i ON i.indexrelid = c.oid
            WHERE c.relname = $1
            "#,
            vec![kind.ann_index_name().into()],
        );
        let Some(row) = self.conn().query_one(stmt).await? else {
            return Ok(None);
        };
        let reloptions: Option<Vec<String>> = row
            .try_get_by_index(0)
            .map_err(|e| AppError::internal(e.to_string()))?;
        let Some(reloptions) = reloptions else {
            return Ok(None);
        };
        let re = regex_lite::Regex::new(r"lists=(\d+)")
            .map_err(|e| AppError::internal(format!("invalid reloptions regex: {e}")))?;
        Ok(reloptions.iter().find_map(|opt| {
            re.captures(opt)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<i64>().ok())
        }))
    }

    /// `CREATE INDEX IF NOT EXISTS` with the given `lists` build parameter.
    pub async fn ensure_ann_index(&self, kind: EntityKind, lists: i64) -> Result<()> {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING ivfflat ({} vector_l2_ops) WITH (lists = {lists})",
            kind.ann_index_name(),
            kind.embeddings_table(),
            kind.vector_column(),
        );
        self.conn().execute_unprepared(&sql).await?;
        Ok(())
    }

    pub async fn drop_ann_index(&self, kind: EntityKind) -> Result<()> {
        let sql = format!("DROP INDEX IF EXISTS {}", kind.ann_index_name());
        self.conn().execute_unprepared(&sql).await?;
        Ok(())
    }
}

async fn find_paper_id_by_openalex(
    conn: &impl ConnectionTrait,
    openalex_id: &str,
) -> Result<Option<i64>> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT id FROM papers WHERE external_ids ->> 'openalex' = $1",
        vec![openalex_id.into()],
    );
    let row = conn.query_one(stmt).await?;
    Ok(row.and_then(|r| r.try_get_by_index::<i64>(0).ok()))
}

async fn insert_paper(
    conn: &impl ConnectionTrait,
    p: NormalizedPaper,
    now: chrono::DateTime<Utc>,
) -> Result<Paper> {
    let am = PaperActiveModel {
        title: Set(p.title),
        abstract_text: Set(p.abstract_text),
        year: Set(p.year),
        publication_date: Set(p.publication_date.map(Into::into)),
        doi: Set(p.doi),
        field: Set(p.field),
        language: Set(p.language),
        referenced_works: Set(serde_json::Value::from(p.referenced_works)),
        concepts: Set(p.concepts),
        external_ids: Set(p.external_ids),
        source_id: Set(p.source_id),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };
    am.insert(conn).await.map_err(AppError::from)
}

async fn update_paper(
    conn: &impl ConnectionTrait,
    id: i64,
    p: NormalizedPaper,
    now: chrono::DateTime<Utc>,
) -> Result<Paper> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        UPDATE papers SET
            title = $1,
            "abstract" = $2,
            year = $3,
            publication_date = $4,
            doi = COALESCE(doi, $5),
            field = $6,
            language = $7,
            referenced_works = $8,
            concepts = $9,
            external_ids = external_ids || $10,
            source_id = COALESCE(source_id, $11),
            updated_at = $12
        WHERE id = $13
        "#,
        vec![
            p.title.into(),
            p.abstract_text.into(),
            p.year.into(),
            p.publication_date.map(|d| d.naive_utc()).into(),
            p.doi.into(),
            p.field.into(),
            p.language.into(),
            serde_json::Value::from(p.referenced_works).into(),
            p.concepts.into(),
            p.external_ids.into(),
            p.source_id.into(),
            now.naive_utc().into(),
            id.into(),
        ],
    );
    conn.execute(stmt).await?;

    PaperEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::internal(format!("paper {id} vanished mid-upsert")))
}

fn ids_to_array_value(kind: EntityKind, ids: &[EntityId]) -> sea_orm::Value {
    match kind {
        EntityKind::Paper => {
            let v: Vec<i64> = ids
                .iter()
                .filter_map(|i| match i {
                    EntityId::Paper(id) => Some(*id),
                    _ => None,
                })
                .collect();
            v.into()
        }
        EntityKind::Concept => {
            let v: Vec<String> = ids
                .iter()
                .filter_map(|i| match i {
                    EntityId::Concept(id) => Some(id.clone()),
                    _ => None,
                })
                .collect();
            v.into()
        }
    }
}

fn vector_literal(v: &[f32]) -> String {
    format!(
        "[{}]",
        v.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(",")
    )
}

fn row_to_paper(row: &sea_orm::QueryResult) -> Result<Paper> {
    Ok(Paper {
        id: row.try_get_by("id").map_err(|e| AppError::internal(e.to_string()))?,
        title: row.try_get_by("title").map_err(|e| AppError::internal(e.to_string()))?,
        abstract_text: row
            .try_get_by("abstract")
            .map_err(|e| AppError::internal(e.to_string()))?,
        year: row.try_get_by("year").map_err(|e| AppError::internal(e.to_string()))?,
        publication_date: row
            .try_get_by("publication_date")
            .map_err(|e| AppError::internal(e.to_string()))?,
        doi: row.try_get_by("doi").map_err(|e| AppError::internal(e.to_string()))?,
        field: row.try_get_by("field").map_err(|e| AppError::internal(e.to_string()))?,
        language: row
            .try_get_by("language")
            .map_err(|e| AppError::internal(e.to_string()))?,
        referenced_works: row
            .try_get_by("referenced_works")
            .map_err(|e| AppError::internal(e.to_string()))?,
        concepts: row
            .try_get_by("concepts")
            .map_err(|e| AppError::internal(e.to_string()))?,
        external_ids: row
            .try_get_by("external_ids")
            .map_err(|e| AppError::internal(e.to_string()))?,
        source_id: row
            .try_get_by("source_id")
            .map_err(|e| AppError::internal(e.to_string()))?,
        created_at: row
            .try_get_by("created_at")
            .map_err(|e| AppError::internal(e.to_string()))?,
        updated_at: row
            .try_get_by("updated_at")
            .map_err(|e| AppError::internal(e.to_string()))?,
    })
}

fn row_to_concept(row: &sea_orm::QueryResult) -> Result<Concept> {
    Ok(Concept {
        id: row.try_get_by("id").map_err(|e| AppError::internal(e.to_string()))?,
        name: row.try_get_by("name").map_err(|e| AppError::internal(e.to_string()))?,
        level: row.try_get_by("level").map_err(|e| AppError::internal(e.to_string()))?,
        description: row
            .try_get_by("description")
            .map_err(|e| AppError::internal(e.to_string()))?,
        works_count: row
            .try_get_by("works_count")
            .map_err(|e| AppError::internal(e.to_string()))?,
        cited_by_count: row
            .try_get_by("cited_by_count")
            .map_err(|e| AppError::internal(e.to_string()))?,
        related_concepts: row
            .try_get_by("related_concepts")
            .map_err(|e| AppError::internal(e.to_string()))?,
        created_at: row
            .try_get_by("created_at")
            .map_err(|e| AppError::internal(e.to_string()))?,
        updated_at: row
            .try_get_by("updated_at")
            .map_err(|e| AppError::internal(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal_format() {
        assert_eq!(vector_literal(&[1.0, 2.5, -3.0]), "[1,2.5,-3]");
    }

    #[test]
    fn test_entity_kind_table_names() {
        assert_eq!(EntityKind::Paper.embeddings_table(), "paper_embeddings");
        assert_eq!(EntityKind::Concept.embeddings_table(), "concept_embeddings");
        assert_eq!(EntityKind::Paper.id_column(), "paper_id");
        assert_eq!(EntityKind::Concept.id_column(), "concept_id");
    }
}
