//! Buffered batch delivery: one `application/json` body holding every item.

use super::{HttpAdapter, Mode, Phase, PhaseTracker};
use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::fanout::{BatchCollector, FanOut};
use crate::types::BatchResponse;
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

/// Batch adapter: fetch all items, then answer with a single write
#[derive(Clone)]
pub struct BatchAdapter {
    engine: FanOut,
    config: BatchConfig,
    cancel_token: CancellationToken,
}

impl BatchAdapter {
    /// Create an adapter; `cancel_token` is the server-wide shutdown signal
    pub fn new(engine: FanOut, config: BatchConfig, cancel_token: CancellationToken) -> Self {
        Self {
            engine,
            config,
            cancel_token,
        }
    }

    /// Batch settings in use
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Fetch every item and assemble them in submission order.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if the server shuts down before every
    /// result has arrived. Upstream failures never fail the batch.
    pub async fn collect(&self) -> Result<BatchResponse> {
        let mut phase = PhaseTracker::new(Mode::Batch);
        phase.advance(Phase::HeadersSet);
        self.run(&mut phase).await
    }

    async fn run(&self, phase: &mut PhaseTracker) -> Result<BatchResponse> {
        let total = self.config.num_requests;

        phase.advance(Phase::Dispatching);
        let mut dispatch = self
            .engine
            .dispatch(total, self.config.num_workers, &self.cancel_token);

        phase.advance(Phase::Collecting);
        let mut collector = BatchCollector::new(total);
        while let Some(result) = dispatch.next_result().await {
            collector.push(result);
        }
        let failed = collector.failed();

        phase.advance(Phase::Draining);
        dispatch.shutdown().await;
        phase.advance(Phase::Done);

        // Workers only stop short of `total` when the request was cancelled
        let batch = collector.finish().ok_or(Error::Cancelled)?;
        tracing::info!(items = batch.len(), failed, "batch assembled");
        Ok(batch)
    }
}

#[async_trait]
impl HttpAdapter for BatchAdapter {
    fn set_headers(&self, headers: &mut HeaderMap) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    async fn handle(&self) -> Response {
        let mut phase = PhaseTracker::new(Mode::Batch);
        let mut headers = HeaderMap::new();
        self.set_headers(&mut headers);
        phase.advance(Phase::HeadersSet);

        let body = match self.run(&mut phase).await {
            Ok(batch) => batch.to_body(self.config.format),
            Err(e) => Err(e),
        };

        match body {
            Ok(body) => (headers, body).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "batch request failed");
                e.into_response()
            }
        }
    }
}
