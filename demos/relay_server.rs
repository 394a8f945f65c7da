//! Self-contained relay: serves `/stream` and `/batch` and, through the built-in
//! demo upstream, acts as its own item source.
//!
//! ```text
//! cargo run --example relay_server
//! curl -N http://127.0.0.1:8080/stream
//! curl http://127.0.0.1:8080/batch
//! ```
//!
//! Set `RUST_LOG=fanout_relay=debug` for per-request detail. Pass a JSON config
//! file as the first argument to override the defaults.

use fanout_relay::Config;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Point the upstream at our own demo route
    config.server.api.demo_upstream.enabled = true;
    config.upstream.base_url = format!("http://{}/api/item/", config.server.api.bind_address);
    config.validate()?;

    tracing::info!(
        address = %config.server.api.bind_address,
        stream_workers = config.streaming.num_workers,
        batch_workers = config.batch.num_workers,
        "relay server starting"
    );

    fanout_relay::api::start_api_server(Arc::new(config)).await?;
    Ok(())
}
