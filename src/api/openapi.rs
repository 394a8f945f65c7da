//! OpenAPI documentation
//!
//! Generated at compile time with utoipa and served at `/openapi.json`.

use utoipa::OpenApi;

/// OpenAPI documentation for the relay endpoints
#[derive(OpenApi)]
#[openapi(
    info(
        title = "fanout-relay",
        description = "Fetches a fixed batch of upstream items concurrently and relays them in order, buffered or as Server-Sent Events",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        crate::api::routes::stream,
        crate::api::routes::batch,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::demo_item,
    ),
    components(schemas(
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "relay", description = "Fan-out delivery - streamed or buffered"),
        (name = "system", description = "Health checks and the OpenAPI document"),
        (name = "demo", description = "Built-in demo upstream"),
    )
)]
pub struct ApiDoc;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_relay_paths() {
        let spec = ApiDoc::openapi();
        for path in ["/stream", "/batch", "/health", "/openapi.json", "/api/item/{id}"] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn spec_has_error_schema() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.schemas.contains_key("ApiError"));
        assert!(components.schemas.contains_key("ErrorDetail"));
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("text/event-stream"));
    }
}
