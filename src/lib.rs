//! # fanout-relay
//!
//! Fetches a fixed batch of items from an upstream HTTP source concurrently and
//! relays them to the client in submission order, either as one buffered JSON
//! response or incrementally as Server-Sent Events.
//!
//! ## Design
//!
//! - **Ordered fan-in** - workers finish in any order; a cursor plus holding map
//!   restores submission order before anything reaches the client
//! - **Per-item failure** - a failed or timed-out fetch becomes an
//!   `Error <index>: <cause>` placeholder in its own slot, never a failed request
//! - **Keep-alive** - streaming responses carry heartbeat comments while slow
//!   items are outstanding
//! - **One client** - a single pooled HTTP client is shared by every request
//!
//! ## Quick Start
//!
//! ```no_run
//! use fanout_relay::Config;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.upstream.base_url = "http://items.internal/api/item/".to_string();
//!     config.streaming.num_workers = 8;
//!
//!     // Serves /stream and /batch until SIGINT/SIGTERM
//!     fanout_relay::api::start_api_server(Arc::new(config)).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Adapter facade: batch and streaming delivery
pub mod adapter;
/// HTTP server
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Concurrent fan-out/fan-in engine
pub mod fanout;
/// Streaming transport and heartbeats
pub mod transport;
/// Core types
pub mod types;
/// Upstream fetch client
pub mod upstream;

// Re-export commonly used types
pub use adapter::{BatchAdapter, HttpAdapter, StreamingAdapter};
pub use config::{BatchFormat, Config, EmitPolicy};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus, UpstreamCause, UpstreamError};
pub use fanout::{Dispatch, FanOut};
pub use transport::{ChannelSink, FrameSink, HeartbeatTicker};
pub use types::{BatchResponse, FetchResult, Job, StreamFrame, StreamSummary};
pub use upstream::{HttpFetcher, ItemFetcher};

/// Wait for SIGTERM or SIGINT (Ctrl+C elsewhere).
///
/// Falls back to `ctrl_c` if the Unix handlers cannot be registered, which happens
/// in some containers.
#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
        _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
    }
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        return;
    }
    tracing::info!("Received Ctrl+C signal");
}
