//! Application state for the API server

use crate::adapter::{BatchAdapter, StreamingAdapter};
use crate::fanout::FanOut;
use crate::upstream::{HttpFetcher, ItemFetcher};
use crate::{Config, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clones). Both adapters share one upstream
/// client, so the connection pool lives for the whole process.
#[derive(Clone)]
pub struct AppState {
    /// Configuration the server was started with
    pub config: Arc<Config>,

    /// `/stream` adapter
    pub streaming: StreamingAdapter,

    /// `/batch` adapter
    pub batch: BatchAdapter,
}

impl AppState {
    /// Create state around an existing upstream client
    ///
    /// `shutdown` is cancelled when the server stops; in-flight requests observe it.
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn ItemFetcher>,
        shutdown: CancellationToken,
    ) -> Self {
        let engine = FanOut::new(fetcher, config.upstream.timeout);
        let streaming =
            StreamingAdapter::new(engine.clone(), config.streaming.clone(), shutdown.clone());
        let batch = BatchAdapter::new(engine, config.batch.clone(), shutdown);

        Self {
            config,
            streaming,
            batch,
        }
    }

    /// Validate the config and build the process-wide HTTP client
    ///
    /// # Errors
    /// Returns error if the config is invalid or the HTTP client cannot be created
    pub fn from_config(config: Arc<Config>, shutdown: CancellationToken) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.upstream)?;
        Ok(Self::new(config, Arc::new(fetcher), shutdown))
    }
}
