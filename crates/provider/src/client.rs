//! HTTP client surface: concept search, cursor-paginated work listing,
//! source/entity fetch-by-id. Grounded on
//! `original_source/server/ingestion/openalex/client.py` and
//! `original_source/server/ingestion/openalex/fetch_concepts.py`.

use crate::retry::get_with_retry;
use litscout_common::errors::{AppError, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "https://api.openalex.org";
const PER_PAGE: u32 = 200;

/// A resolved concept candidate from `/concepts?search=<field>`.
#[derive(Debug, Clone)]
pub struct ConceptCandidate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub works_count: i64,
}

/// Thin wrapper over `reqwest::Client` implementing the provider's retry and
/// pagination contract. Cheap to clone (spec.md §6's descriptive
/// `User-Agent` is fixed at construction).
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    cancellation: CancellationToken,
}

impl ProviderClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let user_agent = format!(
            "{}/{} (mailto:litscout@example.invalid)",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .expect("reqwest client builder should not fail with static config");

        Self {
            http,
            base_url: base_url.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation handle whose firing aborts any in-flight
    /// retry loop (spec.md §5). Clones share the same token, so a caller
    /// can hold onto it after cloning the client for worker-pool fan-out.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let query = query.to_vec();
        let client = self.http.clone();
        let resp = get_with_retry(&self.http, &self.cancellation, move || {
            client.get(&url).query(&query)
        })
        .await?;

        resp.json::<Value>()
            .await
            .map_err(|e| AppError::ProviderPermanent {
                status: 0,
                message: format!("malformed JSON response: {e}"),
            })
    }

    /// `fetch_concepts(search_term)` — field→concept candidate resolution
    /// (spec.md §4.2 **[SUPPLEMENT]**), sorted desc by `works_count` by the
    /// provider itself.
    pub async fn fetch_concepts(&self, search_term: &str) -> Result<Vec<ConceptCandidate>> {
        let body = self
            .get(
                "/concepts",
                &[
                    ("search".to_string(), search_term.to_string()),
                    ("sort".to_string(), "works_count:desc".to_string()),
                    ("per-page".to_string(), "25".to_string()),
                ],
            )
            .await?;

        let results = body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .map(|raw| crate::normalize::concept_candidate_from_raw(&raw))
            .collect())
    }

    /// Starts a lazy, finite cursor walk over a concept's works
    /// (`(concept_id, max_pages)` → pages of raw work JSON).
    pub fn works_for_concept(&self, concept_id: impl Into<String>, max_pages: usize) -> WorksCursor {
        WorksCursor {
            client: self.clone(),
            concept_id: concept_id.into(),
            max_pages,
            cursor: Some("*".to_string()),
            pages_fetched: 0,
        }
    }

    pub async fn fetch_source(&self, source_id: &str) -> Result<Value> {
        self.get(&format!("/sources/{source_id}"), &[]).await
    }

    /// Generic fetch-by-id (spec.md §6 "`/<entity_id>` as a generic fetcher").
    pub async fn fetch_entity(&self, entity_id: &str) -> Result<Value> {
        self.get(&format!("/{entity_id}"), &[]).await
    }
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor-based page walker over `GET /works?filter=concepts.id:<id>`.
/// Terminates when the provider returns an absent/empty `next_cursor` or
/// `max_pages` is reached (spec.md §4.2).
pub struct WorksCursor {
    client: ProviderClient,
    concept_id: String,
    max_pages: usize,
    cursor: Option<String>,
    pages_fetched: usize,
}

impl WorksCursor {
    /// Fetches the next page, or `None` once the walk is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(cursor) = self.cursor.take() else {
            return Ok(None);
        };
        if self.pages_fetched >= self.max_pages {
            return Ok(None);
        }

        let body = self
            .client
            .get(
                "/works",
                &[
                    ("filter".to_string(), format!("concepts.id:{}", self.concept_id)),
                    ("cursor".to_string(), cursor),
                    ("per-page".to_string(), PER_PAGE.to_string()),
                ],
            )
            .await?;

        let results = body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        self.pages_fetched += 1;
        self.cursor = body
            .get("meta")
            .and_then(|m| m.get("next_cursor"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if results.is_empty() {
            return Ok(None);
        }

        Ok(Some(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn works_cursor_stops_when_max_pages_is_zero() {
        let client = ProviderClient::new();
        let cursor = client.works_for_concept("C123", 0);
        assert_eq!(cursor.pages_fetched, 0);
        assert_eq!(cursor.max_pages, 0);
    }

    #[test]
    fn user_agent_names_the_crate() {
        // Constructing the client should not panic and should embed the
        // package name/version (spec.md §6).
        let _client = ProviderClient::new();
        assert!(env!("CARGO_PKG_NAME").contains("litscout"));
    }

    #[tokio::test]
    async fn cancelled_client_fails_fast_without_a_live_request() {
        let token = CancellationToken::new();
        token.cancel();
        let client = ProviderClient::new().with_cancellation(token);
        let err = client.fetch_source("S123").await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
