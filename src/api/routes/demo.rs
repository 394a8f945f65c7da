//! Demo upstream: lets a single process act as its own item source.

use crate::api::AppState;
use axum::extract::{Path, State};

/// GET /api/item/:id - Demo item, served after the configured delay
#[utoipa::path(
    get,
    path = "/api/item/{id}",
    tag = "demo",
    params(
        ("id" = String, Path, description = "Item index")
    ),
    responses(
        (status = 200, description = "Plain-text item body", body = String, content_type = "text/plain")
    )
)]
pub async fn demo_item(State(state): State<AppState>, Path(id): Path<String>) -> String {
    tokio::time::sleep(state.config.server.api.demo_upstream.delay).await;
    format!("This is item {id}")
}
