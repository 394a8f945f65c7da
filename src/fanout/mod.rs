//! Concurrent fan-out/fan-in engine.
//!
//! One request's lifecycle through the engine:
//!
//! 1. [`FanOut::dispatch`] creates a [`JobQueue`] sized to the batch, spawns a producer
//!    that enqueues indices `0..n` and closes the queue, and spawns a [`WorkerPool`].
//! 2. Workers fetch concurrently and publish tagged [`FetchResult`]s on a bounded
//!    result channel, in completion order.
//! 3. The caller pulls results with [`Dispatch::next_result`] and feeds them to a
//!    [`reassembler`] to restore submission order.
//! 4. [`Dispatch::shutdown`] releases the result channel, cancels anything still in
//!    flight and waits for every task to exit.

pub mod pool;
pub mod queue;
pub mod reassembler;

#[cfg(test)]
pub(crate) mod test_helpers;


pub use pool::{WorkerPool, WorkerStats};
pub use queue::JobQueue;
pub use reassembler::{ArrivalOrder, BatchCollector, OrderedReassembler, Reassembler};

use crate::types::FetchResult;
use crate::upstream::ItemFetcher;
use pool::WorkerPoolParams;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Entry point of the engine: a shared upstream client plus the per-fetch timeout.
///
/// Cheap to clone; every adapter holds one.
#[derive(Clone)]
pub struct FanOut {
    fetcher: Arc<dyn ItemFetcher>,
    fetch_timeout: Duration,
}

impl FanOut {
    /// Create an engine around an upstream client
    pub fn new(fetcher: Arc<dyn ItemFetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            fetch_timeout,
        }
    }

    /// Per-fetch timeout applied by every worker
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Start fetching indices `0..num_requests` on `num_workers` workers.
    ///
    /// The returned [`Dispatch`] owns a child of `cancel_token`; cancelling the
    /// parent abandons every in-flight fetch.
    pub fn dispatch(
        &self,
        num_requests: usize,
        num_workers: usize,
        cancel_token: &CancellationToken,
    ) -> Dispatch {
        let cancel_token = cancel_token.child_token();
        let queue = Arc::new(JobQueue::new(num_requests));
        let (results_tx, results_rx) = mpsc::channel(num_requests.max(1));

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.enqueue_all(num_requests).await })
        };

        let pool = WorkerPool::spawn(WorkerPoolParams {
            num_workers: num_workers.max(1),
            queue,
            fetcher: Arc::clone(&self.fetcher),
            fetch_timeout: self.fetch_timeout,
            results: results_tx,
            cancel_token: cancel_token.clone(),
        });

        tracing::debug!(
            num_requests,
            num_workers = pool.len(),
            "dispatched fetch jobs"
        );

        Dispatch {
            results: results_rx,
            pool,
            producer,
            _cancel_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
            expected: num_requests,
            received: 0,
        }
    }
}

/// A running batch of fetches.
///
/// Dropping it without [`Dispatch::shutdown`] (a request future dropped on client
/// disconnect) cancels the workers.
pub struct Dispatch {
    results: mpsc::Receiver<FetchResult>,
    pool: WorkerPool,
    producer: JoinHandle<usize>,
    cancel_token: CancellationToken,
    _cancel_on_drop: DropGuard,
    expected: usize,
    received: usize,
}

impl Dispatch {
    /// Next published result, in completion order.
    ///
    /// Returns `None` once all expected results have been received, or if every
    /// worker exited early (cancellation).
    pub async fn next_result(&mut self) -> Option<FetchResult> {
        if self.received == self.expected {
            return None;
        }
        let result = self.results.recv().await?;
        self.received += 1;
        Some(result)
    }

    /// Results received so far
    pub fn received(&self) -> usize {
        self.received
    }

    /// Results expected in total
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Release the result channel, cancel outstanding work and wait for the
    /// producer and every worker to exit. Results still in flight are discarded.
    pub async fn shutdown(mut self) -> WorkerStats {
        self.results.close();
        if self.received < self.expected {
            self.cancel_token.cancel();
        }

        if let Err(e) = (&mut self.producer).await {
            tracing::error!(error = %e, "job producer panicked");
        }
        let stats = self.pool.join().await;

        tracing::debug!(
            received = self.received,
            expected = self.expected,
            published = stats.published,
            "fan-out drained"
        );
        stats
    }
}
