//! Incremental delivery as Server-Sent Events.

use super::{HttpAdapter, Mode, Phase, PhaseTracker};
use crate::config::StreamingConfig;
use crate::error::{Error, Result};
use crate::fanout::{Dispatch, FanOut, Reassembler};
use crate::transport::{ChannelSink, FrameSink, HeartbeatTicker, SINK_BUFFER};
use crate::types::{StreamFrame, StreamSummary};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Streaming adapter: data frames in submission order, heartbeats in between
#[derive(Clone)]
pub struct StreamingAdapter {
    engine: FanOut,
    config: StreamingConfig,
    cancel_token: CancellationToken,
}

impl StreamingAdapter {
    /// Create an adapter; `cancel_token` is the server-wide shutdown signal
    pub fn new(engine: FanOut, config: StreamingConfig, cancel_token: CancellationToken) -> Self {
        Self {
            engine,
            config,
            cancel_token,
        }
    }

    /// Streaming settings in use
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Stream one request's results into `sink` and wait for it to finish.
    ///
    /// # Errors
    /// - [`Error::StreamingUnsupported`] if the sink cannot flush; nothing is fetched
    /// - [`Error::TransportClosed`] if the client goes away before the last frame
    /// - [`Error::Cancelled`] if the server shuts down before the last frame
    pub async fn stream(&self, sink: Arc<dyn FrameSink>) -> Result<StreamSummary> {
        let mut phase = PhaseTracker::new(Mode::Streaming);
        phase.advance(Phase::HeadersSet);
        check_streaming_support(&mut phase, sink.as_ref())?;
        self.run(phase, sink).await
    }

    /// Build the response for `sink`, whose frames end up in `body`.
    ///
    /// Headers go out immediately; the stream itself runs on a spawned task. An
    /// unsupported transport is answered with HTTP 500 before any fetch starts.
    pub fn respond(&self, sink: Arc<dyn FrameSink>, body: impl IntoResponse) -> Response {
        let mut phase = PhaseTracker::new(Mode::Streaming);
        let mut headers = HeaderMap::new();
        self.set_headers(&mut headers);
        phase.advance(Phase::HeadersSet);

        if let Err(e) = check_streaming_support(&mut phase, sink.as_ref()) {
            tracing::error!(error = %e, "rejecting stream request");
            return e.into_response();
        }

        let adapter = self.clone();
        tokio::spawn(async move {
            match adapter.run(phase, sink).await {
                Ok(summary) => tracing::info!(
                    emitted = summary.emitted,
                    failed = summary.failed,
                    heartbeats = summary.heartbeats,
                    "stream finished"
                ),
                Err(Error::TransportClosed) => {
                    tracing::debug!("stream client disconnected before completion")
                }
                Err(Error::Cancelled) => tracing::debug!("stream cancelled by server shutdown"),
                Err(e) => tracing::error!(error = %e, "stream failed"),
            }
        });

        (headers, body).into_response()
    }

    async fn run(&self, mut phase: PhaseTracker, sink: Arc<dyn FrameSink>) -> Result<StreamSummary> {
        let request_token = self.cancel_token.child_token();
        let total = self.config.num_requests;

        phase.advance(Phase::Dispatching);
        let ticker = HeartbeatTicker::spawn(
            Arc::clone(&sink),
            self.config.heartbeat_interval,
            &request_token,
        );
        let mut dispatch = self
            .engine
            .dispatch(total, self.config.num_workers, &request_token);

        phase.advance(Phase::Collecting);
        let mut reassembler = Reassembler::for_policy(self.config.emit_policy, total);
        let outcome = emit_in_order(&mut dispatch, &mut reassembler, sink.as_ref()).await;

        phase.advance(Phase::Draining);
        if outcome.is_err() {
            request_token.cancel();
        }
        let heartbeats = ticker.stop().await;
        dispatch.shutdown().await;
        phase.advance(Phase::Done);

        let (emitted, failed) = outcome.map_err(|e| match e {
            // Nothing but a failed heartbeat write cancels the request on its own
            Error::Cancelled if !self.cancel_token.is_cancelled() => Error::TransportClosed,
            e => e,
        })?;
        Ok(StreamSummary {
            emitted,
            failed,
            heartbeats,
        })
    }
}

fn check_streaming_support(phase: &mut PhaseTracker, sink: &dyn FrameSink) -> Result<()> {
    phase.advance(Phase::StreamingSupportChecked);
    if sink.supports_flush() {
        Ok(())
    } else {
        phase.advance(Phase::Done);
        Err(Error::StreamingUnsupported)
    }
}

/// Pull results until the dispatch is exhausted, writing each one as soon as every
/// earlier index has been written. Returns `(emitted, failed)`.
async fn emit_in_order(
    dispatch: &mut Dispatch,
    reassembler: &mut Reassembler,
    sink: &dyn FrameSink,
) -> Result<(usize, usize)> {
    let mut failed = 0;
    while let Some(result) = dispatch.next_result().await {
        for ready in reassembler.push(result) {
            sink.write_frame(&StreamFrame::data(&ready)).await?;
            if ready.is_error() {
                failed += 1;
            }
        }
    }

    // Workers only stop short of the total when the request was cancelled
    if !reassembler.is_complete() {
        return Err(Error::Cancelled);
    }
    Ok((reassembler.emitted(), failed))
}

#[async_trait]
impl HttpAdapter for StreamingAdapter {
    /// Content type and cache control come from the SSE body itself
    fn set_headers(&self, headers: &mut HeaderMap) {
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }

    async fn handle(&self) -> Response {
        tracing::info!(
            num_requests = self.config.num_requests,
            num_workers = self.config.num_workers,
            "stream client connected"
        );
        let (sink, sse) = ChannelSink::with_sse(SINK_BUFFER);
        self.respond(Arc::new(sink), sse)
    }
}
