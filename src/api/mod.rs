//! HTTP server module
//!
//! Mounts the two delivery modes on an axum router, plus health, OpenAPI and the
//! optional demo upstream.

use crate::{Config, Result};
use axum::{Router, http::HeaderValue, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the router with all route definitions
///
/// # Routes
///
/// - `GET /stream` - Items as Server-Sent Events, in submission order
/// - `GET /batch` - All items in one `application/json` body
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /api/item/:id` - Demo upstream (only when enabled in config)
pub fn create_router(state: AppState) -> Router {
    let api = &state.config.server.api;

    let router = Router::new()
        .route("/stream", get(routes::stream))
        .route("/batch", get(routes::batch))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    let router = if api.demo_upstream.enabled {
        router.route("/api/item/:id", get(routes::demo_item))
    } else {
        router
    };

    let cors = api.cors_enabled.then(|| build_cors_layer(&api.cors_origins));
    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Build a CORS layer based on configured origins ("*" allows any origin)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the server on the configured bind address and serve until SIGINT/SIGTERM.
///
/// On shutdown, in-flight streams are cancelled and the listener drains open
/// connections before this returns.
///
/// # Example
///
/// ```no_run
/// use fanout_relay::Config;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// fanout_relay::api::start_api_server(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(config: Arc<Config>) -> Result<()> {
    let shutdown = CancellationToken::new();
    let state = AppState::from_config(Arc::clone(&config), shutdown.clone())?;
    let listener = bind(config.server.api.bind_address).await?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        crate::wait_for_signal().await;
        signal.cancel();
    });

    serve(listener, state, shutdown).await
}

/// Handle to a server started with [`spawn_api_server`]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections, cancel in-flight streams and wait for the
    /// server task to finish
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?
    }
}

/// Bind and serve on a background task. The server runs until
/// [`ServerHandle::shutdown`] is called.
pub async fn spawn_api_server(config: Arc<Config>) -> Result<ServerHandle> {
    let shutdown = CancellationToken::new();
    let state = AppState::from_config(Arc::clone(&config), shutdown.clone())?;
    let listener = bind(config.server.api.bind_address).await?;
    let local_addr = listener.local_addr().map_err(crate::error::Error::Io)?;

    let task = tokio::spawn(serve(listener, state, shutdown.clone()));
    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}

async fn bind(address: SocketAddr) -> Result<TcpListener> {
    tracing::info!(address = %address, "Starting API server");
    let listener = TcpListener::bind(address)
        .await
        .map_err(crate::error::Error::Io)?;
    tracing::info!(
        address = %listener.local_addr().map_err(crate::error::Error::Io)?,
        "API server listening"
    );
    Ok(listener)
}

async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
