//! Adapter facade: one HTTP call end-to-end on top of the fan-out engine.
//!
//! Both adapters walk the same per-request state machine:
//!
//! ```text
//! Init -> HeadersSet -> (StreamingSupportChecked ->)? Dispatching -> Collecting -> Draining -> Done
//! ```
//!
//! The streaming adapter takes the optional support check; a request whose
//! transport cannot flush goes straight from the check to `Done` with an error.

mod batch;
mod streaming;

pub use batch::BatchAdapter;
pub use streaming::StreamingAdapter;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::response::Response;

/// Uniform contract of the delivery modes
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    /// Write the response framing headers for this mode
    fn set_headers(&self, headers: &mut HeaderMap);

    /// Serve one call end-to-end
    async fn handle(&self) -> Response;
}

/// Delivery mode, used to label log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Fully buffered response
    Batch,
    /// Server-Sent Events
    Streaming,
}

impl Mode {
    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Batch => "batch",
            Mode::Streaming => "streaming",
        }
    }
}

/// Step of one request's lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing written yet
    Init,
    /// Response framing headers prepared
    HeadersSet,
    /// Transport confirmed to flush incrementally
    StreamingSupportChecked,
    /// Jobs created and workers started
    Dispatching,
    /// Results being reassembled
    Collecting,
    /// Heartbeats stopped, result channel being released
    Draining,
    /// Response fully written
    Done,
}

impl Phase {
    /// Whether `self -> next` is a legal transition. `Done -> Done` is allowed so
    /// finishing is idempotent.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Init, HeadersSet)
                | (HeadersSet, StreamingSupportChecked)
                | (HeadersSet, Dispatching)
                | (StreamingSupportChecked, Dispatching)
                | (StreamingSupportChecked, Done)
                | (Dispatching, Collecting)
                | (Collecting, Draining)
                | (Draining, Done)
                | (Done, Done)
        )
    }
}

/// Tracks a request's [`Phase`], logging each transition
#[derive(Debug)]
pub struct PhaseTracker {
    mode: Mode,
    phase: Phase,
}

impl PhaseTracker {
    /// Start in [`Phase::Init`]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            phase: Phase::Init,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `next`. Illegal transitions are programming errors: they assert in
    /// debug builds and are logged in release builds.
    pub fn advance(&mut self, next: Phase) {
        let legal = self.phase.can_advance_to(next);
        debug_assert!(legal, "illegal phase transition {:?} -> {:?}", self.phase, next);
        if !legal {
            tracing::error!(
                mode = self.mode.as_str(),
                from = ?self.phase,
                to = ?next,
                "illegal request phase transition"
            );
        }
        tracing::trace!(mode = self.mode.as_str(), from = ?self.phase, to = ?next, "request phase");
        self.phase = next;
    }
}
