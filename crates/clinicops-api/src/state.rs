//! Shared application state.

use std::sync::Arc;

use clinicops_event_store::EventStore;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The event store every handler reads from and writes to.
    pub event_store: Arc<EventStore>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(event_store: Arc<EventStore>) -> Self {
        Self { event_store }
    }
}
