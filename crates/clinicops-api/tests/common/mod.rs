//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use clinicops_api::state::AppState;
use clinicops_event_store::{EventStore, EventStoreConfig, build_event_store};
use clinicops_test_support::FixedClock;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Source stamped on events emitted through the test app.
pub const TEST_SOURCE: &str = "clinicops-api-test";

/// Build an in-memory event store with a fixed clock, the way `main.rs`
/// builds one from configuration.
pub fn build_test_store() -> Arc<EventStore> {
    let clock = FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    );
    let store = build_event_store(&EventStoreConfig::new(TEST_SOURCE))
        .unwrap()
        .with_clock(Arc::new(clock));
    Arc::new(store)
}

/// Build the full app router around `store`.
pub fn build_test_app(store: &Arc<EventStore>) -> Router {
    clinicops_api::app(AppState::new(Arc::clone(store)))
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
