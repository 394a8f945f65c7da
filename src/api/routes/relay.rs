//! Delivery handlers: `/stream` and `/batch`.

use crate::adapter::HttpAdapter;
use crate::api::AppState;
use axum::{extract::State, response::Response};

/// GET /stream - Items as Server-Sent Events
///
/// Data frames arrive in submission order; `: heartbeat` comments keep the
/// connection alive while slow items are fetched.
#[utoipa::path(
    get,
    path = "/stream",
    tag = "relay",
    responses(
        (status = 200, description = "Server-sent events stream, one data frame per item", content_type = "text/event-stream"),
        (status = 500, description = "Transport cannot stream", body = crate::error::ApiError)
    )
)]
pub async fn stream(State(state): State<AppState>) -> Response {
    state.streaming.handle().await
}

/// GET /batch - All items in one response
#[utoipa::path(
    get,
    path = "/batch",
    tag = "relay",
    responses(
        (status = 200, description = "Items in submission order; failed items carry an `Error <index>: <cause>` placeholder", body = Vec<String>),
        (status = 500, description = "Request could not be completed", body = crate::error::ApiError)
    )
)]
pub async fn batch(State(state): State<AppState>) -> Response {
    state.batch.handle().await
}
