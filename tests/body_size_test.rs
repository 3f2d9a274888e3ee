// Integration tests for body size limit enforcement on the ingestion routes

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fleetwatch::api::{create_router, AppState, IngestSink};
use fleetwatch::state::StateEngine;
use std::sync::Arc;
use tower::ServiceExt;

const EVENT: &str = r#"{"entityId":"bike-001","timestamp":1000,"location":{"lat":19.076,"lng":72.8777},"speed":10.0,"batteryLevel":90.0}"#;

fn create_test_app(single_limit: usize, batch_limit: usize) -> (Arc<StateEngine>, Router) {
    let engine = Arc::new(StateEngine::new());
    let app = create_router(AppState {
        sink: IngestSink::Direct,
        state_engine: engine.clone(),
        body_size_limit_single_bytes: single_limit,
        body_size_limit_batch_bytes: batch_limit,
    });
    (engine, app)
}

async fn post(app: Router, uri: &str, body: String) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// POST /api/telemetry with body exceeding single limit → 413
#[tokio::test]
async fn test_single_event_body_too_large_returns_413() {
    let (engine, app) = create_test_app(10, 10_485_760);

    let (status, body) = post(app, "/api/telemetry", EVENT.to_string()).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload too large");
    assert!(engine.is_empty());
}

/// POST /api/telemetry exactly at the limit is accepted
#[tokio::test]
async fn test_single_event_at_limit_accepted() {
    let (engine, app) = create_test_app(EVENT.len(), 10_485_760);

    let (status, _) = post(app, "/api/telemetry", EVENT.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(engine.len(), 1);
}

/// Batch uses its own, larger limit
#[tokio::test]
async fn test_batch_limit_independent_of_single_limit() {
    let batch = format!(r#"{{"events":[{}]}}"#, EVENT);

    let (_, app) = create_test_app(10, 10_485_760);
    let (status, body) = post(app, "/api/telemetry/batch", batch.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["successful"], 1);

    let (_, app) = create_test_app(1_048_576, 10);
    let (status, _) = post(app, "/api/telemetry/batch", batch).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
