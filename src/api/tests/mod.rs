use super::*;
use crate::config::{BatchFormat, Config};
use crate::fanout::test_helpers::{ScriptedFetcher, Step};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use std::time::Duration;
use tower::ServiceExt;

fn test_config() -> Config {
    let mut config = Config::default();
    config.streaming.num_requests = 3;
    config.streaming.num_workers = 3;
    config.batch.num_requests = 3;
    config.batch.num_workers = 1;
    config.upstream.timeout = Duration::from_millis(200);
    config
}

fn router_with(config: Config, fetcher: ScriptedFetcher) -> Router {
    let state = AppState::new(Arc::new(config), Arc::new(fetcher), CancellationToken::new());
    create_router(state)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn stream_route_returns_sse_frames_in_order() {
    let fetcher = ScriptedFetcher::with_delays_ms(&[40, 20, 0]);
    let app = router_with(test_config(), fetcher);

    let response = app.oneshot(get_request("/stream")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    assert_eq!(
        body_string(response).await,
        "data: item-0\n\ndata: item-1\n\ndata: item-2\n\n"
    );
}

#[tokio::test]
async fn stream_route_embeds_timeout_placeholder() {
    let fetcher = ScriptedFetcher::new().step(1, Step::Hang);
    let app = router_with(test_config(), fetcher);

    let body = body_string(app.oneshot(get_request("/stream")).await.unwrap()).await;
    let frames: Vec<&str> = body.split("\n\n").filter(|f| !f.is_empty()).collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], "data: item-0");
    assert!(frames[1].starts_with("data: Error 1: request timed out"), "got {}", frames[1]);
    assert_eq!(frames[2], "data: item-2");
}

#[tokio::test]
async fn batch_route_returns_json_array() {
    let app = router_with(test_config(), ScriptedFetcher::new());

    let response = app.oneshot(get_request("/batch")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(body_string(response).await, r#"["item-0","item-1","item-2"]"#);
}

#[tokio::test]
async fn batch_route_legacy_format() {
    let mut config = test_config();
    config.batch.format = BatchFormat::Legacy;
    let app = router_with(config, ScriptedFetcher::new());

    let body = body_string(app.oneshot(get_request("/batch")).await.unwrap()).await;
    assert_eq!(body, r#"["[item-0 item-1 item-2]"]"#);
}

#[tokio::test]
async fn health_reports_version() {
    let app = router_with(test_config(), ScriptedFetcher::new());

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn openapi_route_serves_document() {
    let app = router_with(test_config(), ScriptedFetcher::new());

    let response = app.oneshot(get_request("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(json["paths"]["/stream"].is_object());
}

#[tokio::test]
async fn demo_route_is_off_by_default() {
    let app = router_with(test_config(), ScriptedFetcher::new());
    let response = app.oneshot(get_request("/api/item/4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn demo_route_serves_items_after_delay() {
    let mut config = test_config();
    config.server.api.demo_upstream.enabled = true;
    config.server.api.demo_upstream.delay = Duration::from_millis(30);
    let app = router_with(config, ScriptedFetcher::new());

    let started = std::time::Instant::now();
    let response = app.oneshot(get_request("/api/item/4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "This is item 4");
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn cors_enabled() {
    let app = router_with(test_config(), ScriptedFetcher::new());

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/health")
        .header(header::ORIGIN, "http://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

#[tokio::test]
async fn cors_disabled() {
    let mut config = test_config();
    config.server.api.cors_enabled = false;
    let app = router_with(config, ScriptedFetcher::new());

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

#[tokio::test]
async fn cors_specific_origins() {
    let mut config = test_config();
    config.server.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = router_with(config, ScriptedFetcher::new());

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://allowed.example"
    );
}

#[tokio::test]
async fn from_config_rejects_invalid_config() {
    let mut config = test_config();
    config.streaming.num_workers = 0;

    let err = AppState::from_config(Arc::new(config), CancellationToken::new())
        .err()
        .expect("zero workers must be rejected");
    assert!(matches!(err, crate::Error::Config { .. }));
}

#[tokio::test]
async fn spawned_server_binds_ephemeral_port_and_shuts_down() {
    let mut config = test_config();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let handle = spawn_api_server(Arc::new(config)).await.unwrap();
    assert_ne!(handle.local_addr().port(), 0);

    let health = reqwest::get(format!("http://{}/health", handle.local_addr()))
        .await
        .unwrap();
    assert!(health.status().is_success());

    tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
        .await
        .expect("graceful shutdown should finish")
        .unwrap();
}
