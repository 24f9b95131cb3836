//! Test repositories — mock `EventRepository` implementations for tests.

use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use clinicops_core::error::EventStoreError;
use clinicops_core::event::EventRecord;
use clinicops_core::repository::{AppendOutcome, EventRepository};

/// An event repository that records every appended event and always
/// succeeds. Reads return nothing.
#[derive(Debug, Default)]
pub struct RecordingEventRepository {
    appended: Mutex<Vec<EventRecord>>,
}

impl RecordingEventRepository {
    /// Create an empty recording repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all events that were appended.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<EventRecord> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn append(&self, event: &EventRecord) -> Result<AppendOutcome, EventStoreError> {
        self.appended.lock().unwrap().push(event.clone());
        Ok(AppendOutcome::Appended)
    }

    async fn get_by_correlation_id(
        &self,
        _correlation_id: &str,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        Ok(vec![])
    }

    async fn get_by_aggregate_id(
        &self,
        _aggregate_id: &str,
        _after_version: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        Ok(vec![])
    }

    async fn get_by_type(
        &self,
        _event_type: &str,
        _limit: usize,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        Ok(vec![])
    }
}

fn connection_refused() -> EventStoreError {
    EventStoreError::storage(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

/// An event repository whose every operation fails with a storage error.
/// Useful for testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn append(&self, _event: &EventRecord) -> Result<AppendOutcome, EventStoreError> {
        Err(connection_refused())
    }

    async fn get_by_correlation_id(
        &self,
        _correlation_id: &str,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        Err(connection_refused())
    }

    async fn get_by_aggregate_id(
        &self,
        _aggregate_id: &str,
        _after_version: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        Err(connection_refused())
    }

    async fn get_by_type(
        &self,
        _event_type: &str,
        _limit: usize,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        Err(connection_refused())
    }
}
