//! Event repository abstraction.

use async_trait::async_trait;

use crate::error::EventStoreError;
use crate::event::EventRecord;

/// Number of events `get_by_type` returns when the caller gives no limit.
pub const DEFAULT_TYPE_LIMIT: usize = 100;

/// Result of a successful `append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The event was persisted.
    Appended,
    /// An event with the same idempotency key already exists; nothing was written.
    Duplicate,
}

/// Storage-agnostic contract for the append-only event log.
///
/// Implementations enforce both uniqueness invariants themselves: one event
/// per idempotency key, and one event per `(aggregate_id, version)` pair
/// when both are present.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persist `event` unless its idempotency key is already stored.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::ConcurrencyConflict` when another event
    /// already claims the same aggregate id and version. Storage failures are
    /// returned as `EventStoreError::Storage` unchanged.
    async fn append(&self, event: &EventRecord) -> Result<AppendOutcome, EventStoreError>;

    /// All events sharing `correlation_id`, in append order.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if the backend cannot be read.
    async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<EventRecord>, EventStoreError>;

    /// Events of one aggregate ordered by ascending version, with absent
    /// versions sorting as 0. When `after_version` is given only events with
    /// a greater version are returned.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if the backend cannot be read.
    async fn get_by_aggregate_id(
        &self,
        aggregate_id: &str,
        after_version: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError>;

    /// The `limit` most recently appended events of `event_type`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if the backend cannot be read.
    async fn get_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, EventStoreError>;

    /// Prepare the backend for use. Idempotent.
    ///
    /// # Errors
    ///
    /// Durable backends return `EventStoreError::Configuration` or
    /// `EventStoreError::Storage` when setup fails.
    async fn initialize(&self) -> Result<(), EventStoreError> {
        Ok(())
    }

    /// Release backend resources. Closing an uninitialized backend is a no-op.
    ///
    /// # Errors
    ///
    /// Implementations may report failures while releasing resources.
    async fn close(&self) -> Result<(), EventStoreError> {
        Ok(())
    }
}
