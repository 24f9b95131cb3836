//! Integration tests for the events API.

mod common;

use axum::http::StatusCode;
use uuid::Uuid;

#[tokio::test]
async fn test_lead_created_round_trip() {
    let store = common::build_test_store();

    // POST /api/v1/events
    let (status, json) = common::post_json(
        common::build_test_app(&store),
        "/api/v1/events",
        &serde_json::json!({
            "event_type": "LeadCreated",
            "correlation_id": "corr-1",
            "payload": {"leadId": "L1"},
            "aggregate_id": "L1",
            "version": 1
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let event_id = Uuid::parse_str(json["id"].as_str().unwrap()).unwrap();
    assert_eq!(json["metadata"]["source"], common::TEST_SOURCE);
    assert!(json["metadata"]["timestamp"].is_string());

    // GET /api/v1/events/aggregate/L1 — verify persisted state
    let (status, json) =
        common::get_json(common::build_test_app(&store), "/api/v1/events/aggregate/L1").await;

    assert_eq!(status, StatusCode::OK);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], event_id.to_string());
    assert_eq!(events[0]["payload"]["leadId"], "L1");
}

#[tokio::test]
async fn test_second_emit_for_same_version_returns_409() {
    let store = common::build_test_store();
    let body = |key: &str| {
        serde_json::json!({
            "event_type": "LeadCreated",
            "correlation_id": "corr-1",
            "payload": {"leadId": "L1"},
            "aggregate_id": "L1",
            "version": 1,
            "idempotency_key": key
        })
    };

    let (status, _) =
        common::post_json(common::build_test_app(&store), "/api/v1/events", &body("a")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) =
        common::post_json(common::build_test_app(&store), "/api/v1/events", &body("b")).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "concurrency_conflict");
    assert!(json["message"].as_str().unwrap().contains("L1"));
}

#[tokio::test]
async fn test_retried_request_with_same_key_is_recorded_once() {
    let store = common::build_test_store();
    let body = serde_json::json!({
        "event_type": "AppointmentBooked",
        "correlation_id": "corr-7",
        "payload": {"slot": "09:30"},
        "idempotency_key": "booking-42"
    });

    for _ in 0..3 {
        let (status, _) =
            common::post_json(common::build_test_app(&store), "/api/v1/events", &body).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = common::get_json(
        common::build_test_app(&store),
        "/api/v1/events/correlation/corr-7",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_by_type_defaults_to_most_recent_hundred() {
    let store = common::build_test_store();
    for i in 0..120 {
        let (status, _) = common::post_json(
            common::build_test_app(&store),
            "/api/v1/events",
            &serde_json::json!({
                "event_type": "LeadScored",
                "correlation_id": "corr-s",
                "payload": {"i": i}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = common::get_json(
        common::build_test_app(&store),
        "/api/v1/events/type/LeadScored",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 100);
    assert_eq!(events[0]["payload"]["i"], 20);
    assert_eq!(events[99]["payload"]["i"], 119);
}
