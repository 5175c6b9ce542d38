//! Bounded-concurrency task runner: the idiomatic-async-Rust analogue of
//! `ThreadPoolExecutor` + `as_completed` used throughout
//! `original_source/server/ingestion/openalex/ingest.py`. A
//! `tokio::sync::Semaphore` gates `tokio::spawn`ed tasks collected via
//! `futures::stream::FuturesUnordered` (design note §9, "worker pool → task
//! queue with bounded concurrency").

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// spec.md §4.3: the worker pool is hard-capped to 8 against the provider
/// regardless of caller request.
pub const MAX_WORKERS: usize = 8;

/// Resolves the effective worker count: the caller's request, capped at
/// `MAX_WORKERS`, or `min(MAX_WORKERS, available_parallelism)` when
/// unspecified.
pub fn resolve_worker_count(requested: Option<usize>) -> usize {
    match requested {
        Some(n) => n.clamp(1, MAX_WORKERS),
        None => {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            cpus.clamp(1, MAX_WORKERS)
        }
    }
}

/// Runs `f(item)` for every item in `items`, at most `concurrency` at a
/// time. Each item owns its own task (and, by convention, its own database
/// connection) — the pool never shares mutable state across tasks
/// (spec.md §4.3, §5). A panicking task is logged and its result dropped
/// rather than propagated, matching the teacher's `JoinSet` convention of
/// catching panics as `JoinError`.
///
/// `cancellation` implements spec.md §5's cooperative cancellation: a task
/// still waiting on its semaphore permit (submitted but not yet started)
/// is dropped without running `f` once the token fires; a task that has
/// already acquired its permit and is running `f` is left to finish (and,
/// by convention, commit or roll back its own transaction) rather than
/// being aborted mid-flight.
pub async fn run_bounded<I, F, Fut, T>(
    items: Vec<I>,
    concurrency: usize,
    cancellation: CancellationToken,
    f: F,
) -> Vec<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let f = Arc::new(f);

    let mut tasks = FuturesUnordered::new();
    for item in items {
        let permit = Arc::clone(&semaphore);
        let f = Arc::clone(&f);
        let cancellation = cancellation.clone();
        tasks.push(tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancellation.cancelled() => None,
                permit = permit.acquire_owned() => Some(permit.expect("semaphore is never closed")),
            };
            match permit {
                Some(_permit) => Some(f(item).await),
                None => None,
            }
        }));
    }

    let mut out = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.next().await {
        match joined {
            Ok(Some(value)) => out.push(value),
            Ok(None) => tracing::info!("task dropped before starting: cancelled"),
            Err(e) => tracing::error!(error = %e, "ingestion task panicked"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_worker_count_caps_at_eight() {
        assert_eq!(resolve_worker_count(Some(100)), MAX_WORKERS);
        assert_eq!(resolve_worker_count(Some(3)), 3);
        assert!(resolve_worker_count(None) <= MAX_WORKERS);
        assert!(resolve_worker_count(None) >= 1);
    }

    #[tokio::test]
    async fn run_bounded_collects_all_results_in_some_order() {
        let items: Vec<i32> = (0..10).collect();
        let mut results = run_bounded(items, 3, CancellationToken::new(), |i| async move { i * 2 }).await;
        results.sort();
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn run_bounded_drops_not_yet_started_tasks_on_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let items: Vec<i32> = (0..10).collect();
        let results = run_bounded(items, 3, token, |i| async move { i * 2 }).await;
        assert!(results.is_empty());
    }
}
