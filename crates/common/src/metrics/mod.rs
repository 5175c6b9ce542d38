//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming, following the teacher's
//! prefix-constant + `describe_*!` registration pattern.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all LitScout metrics.
pub const METRICS_PREFIX: &str = "litscout";

/// Latency buckets shared by ingestion/embedding/search timers (seconds).
pub const LATENCY_BUCKETS: &[f64] = &[
    0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 30.00, 60.00,
];

/// Registers every metric this crate emits along with its description and
/// unit. Call once at process startup.
pub fn register_metrics() {
    describe_counter!(
        metric("papers_ingested_total"),
        Unit::Count,
        "Total papers upserted by the ingestion pipeline"
    );
    describe_counter!(
        metric("concepts_resolved_total"),
        Unit::Count,
        "Total field names resolved to a concept id"
    );
    describe_histogram!(
        metric("ingestion_duration_seconds"),
        Unit::Seconds,
        "Duration of one concept-ingestion task"
    );
    describe_counter!(
        metric("embeddings_written_total"),
        Unit::Count,
        "Total embedding rows upserted"
    );
    describe_histogram!(
        metric("embedding_batch_duration_seconds"),
        Unit::Seconds,
        "Duration of one encoder batch call"
    );
    describe_counter!(
        metric("search_queries_total"),
        Unit::Count,
        "Total search requests, labeled by mode"
    );
    describe_histogram!(
        metric("search_duration_seconds"),
        Unit::Seconds,
        "Duration of a search request, labeled by mode"
    );
    describe_counter!(
        metric("ann_index_tunes_total"),
        Unit::Count,
        "Total ANN index create-or-recreate operations"
    );
}

fn metric(name: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, name)
}

/// Tracks a single ingestion task from task start to completion.
pub struct IngestMetrics {
    start: Instant,
}

impl IngestMetrics {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn finish(self, papers: u64) {
        counter!(metric("papers_ingested_total")).increment(papers);
        histogram!(metric("ingestion_duration_seconds")).record(self.start.elapsed().as_secs_f64());
    }
}

/// Tracks a single embedding batch call.
pub struct EmbedMetrics {
    start: Instant,
}

impl EmbedMetrics {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn finish(self, embedded: u64) {
        counter!(metric("embeddings_written_total")).increment(embedded);
        histogram!(metric("embedding_batch_duration_seconds"))
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Tracks a single search request for a given mode (`papers`, `concepts`,
/// `hybrid`, `venues`, `authors`).
pub struct SearchMetrics {
    start: Instant,
    mode: &'static str,
}

impl SearchMetrics {
    pub fn start(mode: &'static str) -> Self {
        counter!(metric("search_queries_total"), "mode" => mode).increment(1);
        Self {
            start: Instant::now(),
            mode,
        }
    }

    pub fn finish(self) {
        histogram!(metric("search_duration_seconds"), "mode" => self.mode)
            .record(self.start.elapsed().as_secs_f64());
    }
}

pub fn record_ann_tune() {
    counter!(metric("ann_index_tunes_total")).increment(1);
}

pub fn record_concepts_resolved(n: u64) {
    counter!(metric("concepts_resolved_total")).increment(n);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_ascending() {
        for pair in LATENCY_BUCKETS.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_metric_name_prefixing() {
        assert_eq!(metric("papers_ingested_total"), "litscout_papers_ingested_total");
    }

    #[test]
    fn test_ingest_metrics_records_elapsed() {
        let m = IngestMetrics::start();
        std::thread::sleep(std::time::Duration::from_millis(1));
        m.finish(3);
    }
}
