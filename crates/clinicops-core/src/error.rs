//! Event store error types.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed storage-engine error carried through unchanged.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned by event repositories and the event store facade.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Another event already claims this aggregate version.
    ///
    /// Recoverable: re-read the stream and retry with the next version.
    #[error("concurrency conflict on aggregate {aggregate_id}: version {expected_version} already exists")]
    ConcurrencyConflict {
        /// The aggregate whose stream had the conflict.
        aggregate_id: String,
        /// The version the rejected event tried to claim.
        expected_version: i64,
    },

    /// The store was built or initialized with unusable settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The event was rejected before reaching storage.
    #[error("validation error: {0}")]
    Validation(String),

    /// Any other failure from the storage engine, left uninterpreted.
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
}

impl EventStoreError {
    /// Wraps a storage-engine error without reinterpreting it.
    pub fn storage<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }

    /// Returns `true` for version collisions.
    #[must_use]
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Failure reported by a single publisher.
///
/// Publisher failures never reach the caller of `emit`; they are logged and
/// discarded at the fan-out boundary.
#[derive(Debug, Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);
