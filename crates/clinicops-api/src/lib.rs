//! Clinic Ops API — HTTP host for the event store.

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/events", routes::events::router())
        .with_state(state)
}
