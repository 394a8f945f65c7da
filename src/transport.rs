//! Streaming transport: frame sinks and the heartbeat ticker.
//!
//! A [`FrameSink`] accepts whole [`StreamFrame`]s and delivers each one to the client
//! as soon as it is written. [`ChannelSink`] is the production sink: every frame
//! becomes one axum SSE [`Event`] of the response. The [`HeartbeatTicker`] shares the
//! sink with the data path and writes keep-alive frames on a fixed interval until
//! it is stopped.

use crate::error::{Error, Result};
use crate::types::StreamFrame;
use async_trait::async_trait;
use axum::response::sse::{Event, Sse};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Frames buffered between the handler and the HTTP connection
pub const SINK_BUFFER: usize = 16;

/// Destination for stream frames
///
/// Each `write_frame` call delivers one complete frame; concurrent writers never
/// interleave within a frame.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Whether writes reach the client immediately.
    ///
    /// Checked once before any work starts; a sink returning `false` makes the
    /// streaming adapter fail with [`Error::StreamingUnsupported`].
    fn supports_flush(&self) -> bool {
        true
    }

    /// Write and flush one frame.
    ///
    /// # Errors
    /// Returns [`Error::TransportClosed`] once the client has gone away
    async fn write_frame(&self, frame: &StreamFrame) -> Result<()>;
}

/// Event stream read by the SSE response
pub type EventStream = ReceiverStream<std::result::Result<Event, Infallible>>;

/// Sink backed by a channel whose receiving end is the SSE response
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<std::result::Result<Event, Infallible>>,
}

impl ChannelSink {
    /// Create a sink and the SSE response it feeds.
    ///
    /// The response ends when every clone of the sink has been dropped.
    pub fn with_sse(buffer: usize) -> (Self, Sse<EventStream>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, Sse::new(ReceiverStream::new(rx)))
    }

    /// Whether the client side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn write_frame(&self, frame: &StreamFrame) -> Result<()> {
        self.tx
            .send(Ok(to_event(frame)))
            .await
            .map_err(|_| Error::TransportClosed)
    }
}

/// SSE event for a frame.
///
/// Line breaks are normalized to `\n` so each payload line becomes its own
/// `data:` field.
fn to_event(frame: &StreamFrame) -> Event {
    match frame {
        StreamFrame::Heartbeat => Event::default().comment("heartbeat"),
        StreamFrame::Data(payload) if payload.contains('\r') => {
            Event::default().data(payload.replace("\r\n", "\n").replace('\r', "\n"))
        }
        StreamFrame::Data(payload) => Event::default().data(payload),
    }
}

/// Background task writing heartbeat frames until stopped.
pub struct HeartbeatTicker {
    handle: JoinHandle<u64>,
    cancel_token: CancellationToken,
}

impl HeartbeatTicker {
    /// Start ticking. The first heartbeat is written one full `period` after start.
    ///
    /// The ticker runs on a child of `request_token` so cancelling the request stops
    /// it. If a heartbeat write fails the client is gone: the ticker cancels
    /// `request_token` and exits.
    pub fn spawn(
        sink: Arc<dyn FrameSink>,
        period: Duration,
        request_token: &CancellationToken,
    ) -> Self {
        let cancel_token = request_token.child_token();
        let handle = tokio::spawn(run_ticker(
            sink,
            period,
            cancel_token.clone(),
            request_token.clone(),
        ));
        Self {
            handle,
            cancel_token,
        }
    }

    /// Cancel the ticker and wait for it to exit, returning the number of
    /// heartbeats written. Consumes the handle, so it can only run once.
    pub async fn stop(self) -> u64 {
        self.cancel_token.cancel();
        match self.handle.await {
            Ok(sent) => sent,
            Err(e) => {
                tracing::error!(error = %e, "heartbeat task panicked");
                0
            }
        }
    }
}

async fn run_ticker(
    sink: Arc<dyn FrameSink>,
    period: Duration,
    cancel_token: CancellationToken,
    request_token: CancellationToken,
) -> u64 {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut sent = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {
                match sink.write_frame(&StreamFrame::Heartbeat).await {
                    Ok(()) => {
                        sent += 1;
                        tracing::trace!(sent, "heartbeat written");
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "heartbeat write failed, cancelling request");
                        request_token.cancel();
                        break;
                    }
                }
            }
        }
    }

    sent
}


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::testing::{BufferedOnlySink, RecordingSink};
    use super::*;
    use axum::response::IntoResponse;
    use futures::StreamExt;

    async fn written(frames: &[StreamFrame]) -> String {
        let (sink, sse) = ChannelSink::with_sse(frames.len());
        for frame in frames {
            sink.write_frame(frame).await.unwrap();
        }
        drop(sink);

        let body = sse.into_response().into_body();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn channel_sink_writes_sse_frames() {
        let body = written(&[StreamFrame::Heartbeat, StreamFrame::Data("item-0".into())]).await;
        assert_eq!(body, ": heartbeat\n\ndata: item-0\n\n");
    }

    #[tokio::test]
    async fn multi_line_payload_gets_one_data_field_per_line() {
        let body = written(&[StreamFrame::Data("first\r\nsecond\nthird".into())]).await;
        assert_eq!(body, "data: first\ndata: second\ndata: third\n\n");
    }

    #[tokio::test]
    async fn channel_sink_frames_arrive_one_chunk_each() {
        let (sink, sse) = ChannelSink::with_sse(4);
        let mut stream = sse.into_response().into_body().into_data_stream();

        sink.write_frame(&StreamFrame::Data("a".into())).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"data: a\n\n");
    }

    #[tokio::test]
    async fn channel_sink_reports_closed_client() {
        let (sink, sse) = ChannelSink::with_sse(1);
        drop(sse);

        assert!(sink.is_closed());
        let err = sink
            .write_frame(&StreamFrame::Heartbeat)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
    }

    #[test]
    fn flush_support_defaults_to_true() {
        let (sink, _sse) = ChannelSink::with_sse(1);
        assert!(sink.supports_flush());
        assert!(!BufferedOnlySink.supports_flush());
    }

    #[tokio::test]
    async fn ticker_writes_nothing_before_the_first_interval() {
        let sink = Arc::new(RecordingSink::new());
        let token = CancellationToken::new();
        let ticker = HeartbeatTicker::spawn(sink.clone(), Duration::from_millis(200), &token);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticker.stop().await, 0);
        assert_eq!(sink.heartbeats(), 0);
    }

    #[tokio::test]
    async fn ticker_fires_on_interval_until_stopped() {
        let sink = Arc::new(RecordingSink::new());
        let token = CancellationToken::new();
        let ticker = HeartbeatTicker::spawn(sink.clone(), Duration::from_millis(20), &token);

        tokio::time::sleep(Duration::from_millis(110)).await;
        let sent = ticker.stop().await;
        assert!(sent >= 2, "expected several heartbeats, got {sent}");
        assert_eq!(sink.heartbeats() as u64, sent);

        // Nothing after stop
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sink.heartbeats() as u64, sent);
        assert!(!token.is_cancelled(), "stopping the ticker leaves the request alive");
    }

    #[tokio::test]
    async fn request_cancellation_stops_the_ticker() {
        let sink = Arc::new(RecordingSink::new());
        let token = CancellationToken::new();
        let ticker = HeartbeatTicker::spawn(sink.clone(), Duration::from_millis(10), &token);

        token.cancel();
        let sent = tokio::time::timeout(Duration::from_secs(1), ticker.stop())
            .await
            .expect("ticker must exit after request cancellation");
        assert!(sent <= 1);
    }

    #[tokio::test]
    async fn failed_heartbeat_cancels_the_request() {
        let sink = Arc::new(RecordingSink::closing_after(0));
        let token = CancellationToken::new();
        let ticker = HeartbeatTicker::spawn(sink, Duration::from_millis(10), &token);

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("closed transport must cancel the request");
        assert_eq!(ticker.stop().await, 0);
    }
}
