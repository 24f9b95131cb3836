//! Routes for emitting and querying domain events.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use clinicops_core::event::EventRecord;
use clinicops_event_store::EmitEvent;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct EmitEventRequest {
    /// Event kind.
    pub event_type: String,
    /// Correlation id of the business transaction.
    pub correlation_id: String,
    /// Business data.
    pub payload: serde_json::Value,
    /// Aggregate this event belongs to.
    #[serde(default)]
    pub aggregate_id: Option<String>,
    /// Aggregate kind label.
    #[serde(default)]
    pub aggregate_type: Option<String>,
    /// Aggregate version the event claims.
    #[serde(default)]
    pub version: Option<i64>,
    /// Event that caused this one.
    #[serde(default)]
    pub causation_id: Option<String>,
    /// Supply to make retries of this request idempotent.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl From<EmitEventRequest> for EmitEvent {
    fn from(request: EmitEventRequest) -> Self {
        Self {
            event_type: request.event_type,
            correlation_id: request.correlation_id,
            payload: request.payload,
            aggregate_id: request.aggregate_id,
            aggregate_type: request.aggregate_type,
            version: request.version,
            causation_id: request.causation_id,
            idempotency_key: request.idempotency_key,
        }
    }
}

/// Response body for the query endpoints.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    /// Matching events, in the order the query defines.
    pub events: Vec<EventRecord>,
}

/// Query string for GET /aggregate/{aggregate_id}.
#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    /// Only return events with a greater version.
    pub after_version: Option<i64>,
}

/// Query string for GET /type/{event_type}.
#[derive(Debug, Deserialize)]
pub struct TypeQuery {
    /// Maximum number of events; the store default applies when absent.
    pub limit: Option<usize>,
}

/// POST /
#[instrument(skip(state, request), fields(event_type = %request.event_type, correlation_id = %request.correlation_id))]
async fn emit_event(
    State(state): State<AppState>,
    Json(request): Json<EmitEventRequest>,
) -> Result<Json<EventRecord>, ApiError> {
    let record = state.event_store.emit(request.into()).await?;

    info!(event_id = %record.id, "event emitted");

    Ok(Json(record))
}

/// GET /correlation/{correlation_id}
#[instrument(skip(state))]
async fn get_by_correlation_id(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> Result<Json<EventsResponse>, ApiError> {
    let events = state
        .event_store
        .get_by_correlation_id(&correlation_id)
        .await?;
    Ok(Json(EventsResponse { events }))
}

/// GET /aggregate/{aggregate_id}
#[instrument(skip(state))]
async fn get_by_aggregate_id(
    State(state): State<AppState>,
    Path(aggregate_id): Path<String>,
    Query(query): Query<AggregateQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let events = state
        .event_store
        .get_by_aggregate_id(&aggregate_id, query.after_version)
        .await?;
    Ok(Json(EventsResponse { events }))
}

/// GET /type/{event_type}
#[instrument(skip(state))]
async fn get_by_type(
    State(state): State<AppState>,
    Path(event_type): Path<String>,
    Query(query): Query<TypeQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let events = state
        .event_store
        .get_by_type(&event_type, query.limit)
        .await?;
    Ok(Json(EventsResponse { events }))
}

/// Returns the router for the events API.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(emit_event))
        .route("/correlation/{correlation_id}", get(get_by_correlation_id))
        .route("/aggregate/{aggregate_id}", get(get_by_aggregate_id))
        .route("/type/{event_type}", get(get_by_type))
}
