//! In-process upstream for engine and adapter tests.

use crate::error::{UpstreamCause, UpstreamError};
use crate::upstream::ItemFetcher;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted behaviour for one index
#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Reply `item-<index>` after the delay
    Reply(Duration),
    /// Fail with the cause after the delay
    Fail(Duration, UpstreamCause),
    /// Never complete
    Hang,
}

/// Fetcher whose per-index latency and outcome are fixed up front.
///
/// Unscripted indices reply immediately with `item-<index>`.
#[derive(Clone, Default)]
pub(crate) struct ScriptedFetcher {
    steps: Arc<HashMap<usize, Step>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reply to index `i` after `delays[i]` milliseconds
    pub(crate) fn with_delays_ms(delays: &[u64]) -> Self {
        let steps = delays
            .iter()
            .enumerate()
            .map(|(i, ms)| (i, Step::Reply(Duration::from_millis(*ms))))
            .collect();
        Self {
            steps: Arc::new(steps),
            calls: Arc::default(),
        }
    }

    pub(crate) fn step(mut self, index: usize, step: Step) -> Self {
        Arc::make_mut(&mut self.steps).insert(index, step);
        self
    }

    /// Number of fetches started so far
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn body(index: usize) -> String {
        format!("item-{index}")
    }
}

#[async_trait]
impl ItemFetcher for ScriptedFetcher {
    async fn fetch(&self, index: usize) -> Result<Bytes, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.steps.get(&index).cloned() {
            None => Ok(Bytes::from(Self::body(index))),
            Some(Step::Reply(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(Bytes::from(Self::body(index)))
            }
            Some(Step::Fail(delay, cause)) => {
                tokio::time::sleep(delay).await;
                Err(UpstreamError::new(index, cause))
            }
            Some(Step::Hang) => std::future::pending().await,
        }
    }
}
