//! Domain event record and its metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every stored event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Groups the events of one causal business transaction.
    pub correlation_id: String,
    /// The event that triggered this one, if any.
    pub causation_id: Option<String>,
    /// Identifies one logical write attempt; unique across the store.
    pub idempotency_key: String,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Name of the emitting subsystem.
    pub source: String,
}

/// An immutable domain event as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique event identifier, never reused.
    pub id: Uuid,
    /// Event kind, e.g. `"LeadScored"`. Free-form at the storage layer.
    pub event_type: String,
    /// Entity this event mutates, when it belongs to a versioned stream.
    pub aggregate_id: Option<String>,
    /// Label for the aggregate's kind.
    pub aggregate_type: Option<String>,
    /// Aggregate version this event represents. `Some(0)` is a real version.
    pub version: Option<i64>,
    /// Business data, stored and returned verbatim.
    pub payload: serde_json::Value,
    /// Correlation, causation, idempotency and provenance.
    pub metadata: EventMetadata,
}

impl EventRecord {
    /// Returns the `(aggregate_id, version)` pair this event claims, or
    /// `None` when either half is absent. Only events with a position are
    /// subject to version uniqueness.
    #[must_use]
    pub fn stream_position(&self) -> Option<(&str, i64)> {
        match (&self.aggregate_id, self.version) {
            (Some(aggregate_id), Some(version)) => Some((aggregate_id.as_str(), version)),
            _ => None,
        }
    }

    /// Version used for ordering within an aggregate; absent sorts as 0.
    #[must_use]
    pub fn sort_version(&self) -> i64 {
        self.version.unwrap_or(0)
    }
}
