//! Fixed-size pool of fetch workers.

use super::queue::JobQueue;
use crate::error::{UpstreamCause, UpstreamError};
use crate::types::FetchResult;
use crate::upstream::ItemFetcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Parameters for spawning a worker pool
pub(crate) struct WorkerPoolParams {
    /// Number of concurrent workers
    pub num_workers: usize,
    /// Shared job queue
    pub queue: Arc<JobQueue>,
    /// Upstream client
    pub fetcher: Arc<dyn ItemFetcher>,
    /// Upper bound on one fetch
    pub fetch_timeout: Duration,
    /// Result channel, one clone per worker
    pub results: mpsc::Sender<FetchResult>,
    /// Request-scoped cancellation
    pub cancel_token: CancellationToken,
}

/// Per-worker counters, returned when the worker exits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Results published (successes and failures)
    pub published: usize,
    /// Published results that carried an upstream error
    pub failed: usize,
}

/// Handles of the running workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl WorkerPool {
    /// Spawn `num_workers` workers that drain the queue into the result channel.
    ///
    /// Each worker exits when the queue is closed and empty, when the request is
    /// cancelled, or when the result channel's consumer is gone.
    pub(crate) fn spawn(params: WorkerPoolParams) -> Self {
        let WorkerPoolParams {
            num_workers,
            queue,
            fetcher,
            fetch_timeout,
            results,
            cancel_token,
        } = params;

        let handles = (0..num_workers)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&queue),
                    Arc::clone(&fetcher),
                    fetch_timeout,
                    results.clone(),
                    cancel_token.clone(),
                ))
            })
            .collect();

        Self { handles }
    }

    /// Number of workers spawned
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the pool has no workers
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit and sum their counters
    pub async fn join(self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for (worker, handle) in self.handles.into_iter().enumerate() {
            match handle.await {
                Ok(stats) => {
                    total.published += stats.published;
                    total.failed += stats.failed;
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    tracing::error!(worker, error = %e, "fetch worker panicked");
                }
            }
        }
        total
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<JobQueue>,
    fetcher: Arc<dyn ItemFetcher>,
    fetch_timeout: Duration,
    results: mpsc::Sender<FetchResult>,
    cancel_token: CancellationToken,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            job = queue.dequeue() => job,
        };
        let Some(job) = job else {
            break;
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                tracing::debug!(worker, index = job.index, "abandoning in-flight fetch");
                break;
            }
            outcome = tokio::time::timeout(fetch_timeout, fetcher.fetch(job.index)) => outcome,
        };

        let result = match outcome {
            Ok(Ok(body)) => FetchResult::ok(job.index, body),
            Ok(Err(e)) => FetchResult::failed(job.index, e),
            Err(_) => {
                let cause = UpstreamCause::Timeout(fetch_timeout);
                FetchResult::failed(job.index, UpstreamError::new(job.index, cause))
            }
        };

        let failed = result.is_error();
        if let Err(e) = &result.payload {
            tracing::warn!(worker, index = job.index, error = %e, "upstream fetch failed");
        }

        if results.send(result).await.is_err() {
            tracing::debug!(worker, index = job.index, "result consumer gone, discarding result");
            break;
        }
        stats.published += 1;
        if failed {
            stats.failed += 1;
        }
    }

    stats
}
