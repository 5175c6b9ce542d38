//! LitScout Common Library
//!
//! Shared code across the ingestion, embedding and search crates:
//! - Relational data model and `Store` (SeaORM entities + raw pgvector SQL)
//! - `Embedder` trait and the local Candle-based text encoder
//! - Error types shared by every pipeline
//! - Environment-variable configuration
//! - Metrics and structured logging helpers

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod metrics;

pub use config::AppConfig;
pub use db::{DbPool, Store};
pub use embeddings::{Embedder, LocalEncoder, MockEncoder};
pub use errors::{AppError, Result};

/// Application version, used to build the provider client's User-Agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default local encoder model label (spec.md `EMBED_MODEL` default).
pub const DEFAULT_EMBEDDING_MODEL: &str = "bge-base-en-v1.5";

/// Dimension of the default encoder's output vectors.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
