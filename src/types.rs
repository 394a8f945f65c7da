//! Core types for fanout-relay

use crate::config::BatchFormat;
use crate::error::UpstreamError;
use bytes::Bytes;
use serde::Serialize;

/// One unit of work: fetch the `index`-th upstream item.
///
/// Created once by the dispatcher and consumed by exactly one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Job {
    /// Position of the item in submission order, `0 <= index < num_requests`
    pub index: usize,
}

impl Job {
    /// Create a new Job
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

/// Outcome of one [`Job`], tagged with its originating index so submission
/// order can be restored downstream.
#[derive(Clone, Debug)]
pub struct FetchResult {
    /// Index of the job that produced this result
    pub index: usize,
    /// Raw upstream body, or the reason the fetch failed
    pub payload: Result<Bytes, UpstreamError>,
}

impl FetchResult {
    /// Successful fetch
    pub fn ok(index: usize, body: impl Into<Bytes>) -> Self {
        Self {
            index,
            payload: Ok(body.into()),
        }
    }

    /// Failed fetch of job `index`.
    ///
    /// The error is re-tagged with `index` so the placeholder always names the
    /// slot it is rendered in, whatever index the fetcher reported.
    pub fn failed(index: usize, mut error: UpstreamError) -> Self {
        error.index = index;
        Self {
            index,
            payload: Err(error),
        }
    }

    /// Whether the fetch failed
    pub fn is_error(&self) -> bool {
        self.payload.is_err()
    }

    /// Textual form sent to clients: the body decoded as UTF-8 (lossy) or the
    /// `Error <index>: <cause>` placeholder.
    pub fn render(&self) -> String {
        match &self.payload {
            Ok(body) => String::from_utf8_lossy(body).into_owned(),
            Err(e) => e.to_string(),
        }
    }
}

/// One frame of the Server-Sent Events response
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    /// Keep-alive comment, carries no payload
    Heartbeat,
    /// One item's rendered payload
    Data(String),
}

impl StreamFrame {
    /// Data frame for a fetch result
    pub fn data(result: &FetchResult) -> Self {
        StreamFrame::Data(result.render())
    }
}

/// Fully-buffered batch output: one rendered entry per item, in submission order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatchResponse {
    /// Rendered items, `items[i]` belongs to index `i`
    pub items: Vec<String>,
}

impl BatchResponse {
    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render the body in the requested format.
    ///
    /// `Legacy` reproduces the historical output: the items space-joined inside
    /// brackets, wrapped in a one-element quoted list (`["[a b c]"]`). It is not
    /// valid JSON when items contain quotes.
    pub fn to_body(&self, format: BatchFormat) -> crate::error::Result<String> {
        match format {
            BatchFormat::Json => Ok(serde_json::to_string(&self.items)?),
            BatchFormat::Legacy => Ok(format!("[\"[{}]\"]", self.items.join(" "))),
        }
    }
}

/// Summary of one completed streaming request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Data frames written
    pub emitted: usize,
    /// How many of those carried an error placeholder
    pub failed: usize,
    /// Heartbeat frames written
    pub heartbeats: u64,
}
