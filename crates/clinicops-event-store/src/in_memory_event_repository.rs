//! Process-local implementation of the `EventRepository` trait.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use clinicops_core::error::EventStoreError;
use clinicops_core::event::EventRecord;
use clinicops_core::repository::{AppendOutcome, EventRepository};

#[derive(Debug, Default)]
struct LogState {
    events: Vec<EventRecord>,
    idempotency_keys: HashSet<String>,
    stream_positions: HashSet<(String, i64)>,
}

/// Non-durable event repository held in memory for the life of the process.
///
/// A single lock guards the log and both uniqueness indexes, so the
/// check-then-insert in `append` cannot interleave with another append.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    state: RwLock<LogState>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every stored event and idempotency key.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.events.clear();
        state.idempotency_keys.clear();
        state.stream_positions.clear();
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Returns `true` when nothing has been appended.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.events.is_empty()
    }

    async fn select<F>(&self, predicate: F) -> Vec<EventRecord>
    where
        F: Fn(&EventRecord) -> bool,
    {
        let state = self.state.read().await;
        state
            .events
            .iter()
            .filter(|event| predicate(event))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn append(&self, event: &EventRecord) -> Result<AppendOutcome, EventStoreError> {
        let mut state = self.state.write().await;

        if state
            .idempotency_keys
            .contains(&event.metadata.idempotency_key)
        {
            debug!(
                idempotency_key = %event.metadata.idempotency_key,
                "duplicate idempotency key, skipping append"
            );
            return Ok(AppendOutcome::Duplicate);
        }

        let position = event
            .stream_position()
            .map(|(aggregate_id, version)| (aggregate_id.to_owned(), version));

        if let Some((aggregate_id, version)) = &position {
            if state
                .stream_positions
                .contains(&(aggregate_id.clone(), *version))
            {
                warn!(%aggregate_id, version, "aggregate version already taken");
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.clone(),
                    expected_version: *version,
                });
            }
        }

        state
            .idempotency_keys
            .insert(event.metadata.idempotency_key.clone());
        if let Some(position) = position {
            state.stream_positions.insert(position);
        }
        state.events.push(event.clone());

        debug!(event_id = %event.id, event_type = %event.event_type, "event appended");
        Ok(AppendOutcome::Appended)
    }

    async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        Ok(self
            .select(|event| event.metadata.correlation_id == correlation_id)
            .await)
    }

    async fn get_by_aggregate_id(
        &self,
        aggregate_id: &str,
        after_version: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        let mut events = self
            .select(|event| {
                event.aggregate_id.as_deref() == Some(aggregate_id)
                    && after_version.is_none_or(|after| event.sort_version() > after)
            })
            .await;
        // Stable sort keeps append order among equal versions.
        events.sort_by_key(EventRecord::sort_version);
        Ok(events)
    }

    async fn get_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        let mut events = self.select(|event| event.event_type == event_type).await;
        let start = events.len().saturating_sub(limit);
        Ok(events.split_off(start))
    }
}
