//! OpenAlex-style provider client for LitScout.
//!
//! Three responsibilities (spec.md §4.2): a retrying HTTP GET wrapper, cursor
//! pagination over a concept's works, and normalization of the provider's
//! JSON shape into `litscout_common::db::normalized` DTOs.

mod client;
mod normalize;
mod retry;

pub use client::{ConceptCandidate, ProviderClient, WorksCursor};
pub use normalize::{normalize_concept, normalize_source, normalize_work, NormalizedWork};
pub use retry::get_with_retry;
