//! Event store facade: builds event records, persists them through an
//! `EventRepository` and fans persisted events out to publishers.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use clinicops_core::clock::{Clock, SystemClock};
use clinicops_core::error::EventStoreError;
use clinicops_core::event::{EventMetadata, EventRecord};
use clinicops_core::publisher::EventPublisher;
use clinicops_core::repository::{AppendOutcome, DEFAULT_TYPE_LIMIT, EventRepository};

/// Caller-supplied part of an event. Everything else is stamped by
/// `EventStore::emit`.
#[derive(Debug, Clone, Default)]
pub struct EmitEvent {
    /// Event kind.
    pub event_type: String,
    /// Correlation id of the business transaction.
    pub correlation_id: String,
    /// Business data.
    pub payload: serde_json::Value,
    /// Aggregate this event belongs to.
    pub aggregate_id: Option<String>,
    /// Aggregate kind label.
    pub aggregate_type: Option<String>,
    /// Aggregate version this event claims.
    pub version: Option<i64>,
    /// Event that caused this one.
    pub causation_id: Option<String>,
    /// Supply to deduplicate retries; omit to always record a new event.
    pub idempotency_key: Option<String>,
}

impl EmitEvent {
    /// An unversioned event.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        correlation_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            correlation_id: correlation_id.into(),
            payload,
            ..Self::default()
        }
    }

    /// Places the event at `version` in the stream of `aggregate_id`.
    #[must_use]
    pub fn for_aggregate(mut self, aggregate_id: impl Into<String>, version: i64) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self.version = Some(version);
        self
    }

    /// Sets the aggregate kind label.
    #[must_use]
    pub fn with_aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Records the event that caused this one.
    #[must_use]
    pub fn caused_by(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    /// Opts into deduplication under `idempotency_key`.
    #[must_use]
    pub fn with_idempotency_key(mut self, idempotency_key: impl Into<String>) -> Self {
        self.idempotency_key = Some(idempotency_key.into());
        self
    }
}

/// Public entry point of the event log.
///
/// Construct one per host and pass it to whoever needs it; there is no
/// process-wide default instance.
pub struct EventStore {
    source: String,
    repository: Arc<dyn EventRepository>,
    publishers: Vec<Arc<dyn EventPublisher>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStore")
            .field("source", &self.source)
            .field("publishers", &self.publishers.len())
            .finish_non_exhaustive()
    }
}

impl EventStore {
    /// Creates a store that stamps `source` on every event it emits.
    #[must_use]
    pub fn new(source: impl Into<String>, repository: Arc<dyn EventRepository>) -> Self {
        Self {
            source: source.into(),
            repository,
            publishers: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for event timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a publisher. Publishers are started in registration order
    /// but run independently of each other.
    pub fn add_publisher(&mut self, publisher: Arc<dyn EventPublisher>) {
        self.publishers.push(publisher);
    }

    /// The identity stamped as `metadata.source`.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of registered publishers.
    #[must_use]
    pub fn publisher_count(&self) -> usize {
        self.publishers.len()
    }

    /// Builds, persists and publishes one event.
    ///
    /// Without an idempotency key the store generates one embedding the event
    /// type and correlation id, so every call records a new event. With a
    /// key, a repeated call is a no-op and returns the freshly built record
    /// without publishing it.
    ///
    /// Publishing happens on detached tasks after the append succeeds, so a
    /// Tokio runtime must be running. Publisher failures are logged and never
    /// affect the result.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Validation` for a negative version,
    /// `EventStoreError::ConcurrencyConflict` when the aggregate version is
    /// already taken, and any other repository error unchanged.
    pub async fn emit(&self, event: EmitEvent) -> Result<EventRecord, EventStoreError> {
        if let Some(version) = event.version.filter(|version| *version < 0) {
            return Err(EventStoreError::Validation(format!(
                "event version must be non-negative, got {version}"
            )));
        }

        let id = Uuid::new_v4();
        let idempotency_key = event
            .idempotency_key
            .unwrap_or_else(|| format!("{}:{}:{id}", event.event_type, event.correlation_id));

        let record = EventRecord {
            id,
            event_type: event.event_type,
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type,
            version: event.version,
            payload: event.payload,
            metadata: EventMetadata {
                correlation_id: event.correlation_id,
                causation_id: event.causation_id,
                idempotency_key,
                timestamp: self.clock.now(),
                source: self.source.clone(),
            },
        };

        match self.repository.append(&record).await? {
            AppendOutcome::Appended => self.publish(&record),
            AppendOutcome::Duplicate => debug!(
                idempotency_key = %record.metadata.idempotency_key,
                "event already recorded, not publishing"
            ),
        }

        Ok(record)
    }

    fn publish(&self, record: &EventRecord) {
        if self.publishers.is_empty() {
            return;
        }
        let event = Arc::new(record.clone());
        for (index, publisher) in self.publishers.iter().enumerate() {
            let publisher = Arc::clone(publisher);
            let event = Arc::clone(&event);
            tokio::spawn(async move {
                if let Err(err) = publisher.publish(&event).await {
                    warn!(
                        publisher = index,
                        event_id = %event.id,
                        event_type = %event.event_type,
                        error = %err,
                        "publisher failed, event not delivered"
                    );
                }
            });
        }
    }

    /// Events sharing `correlation_id`, in append order.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if the repository cannot be read.
    pub async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        self.repository.get_by_correlation_id(correlation_id).await
    }

    /// Events of one aggregate by ascending version, optionally only those
    /// after `after_version`.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if the repository cannot be read.
    pub async fn get_by_aggregate_id(
        &self,
        aggregate_id: &str,
        after_version: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        self.repository
            .get_by_aggregate_id(aggregate_id, after_version)
            .await
    }

    /// The most recent events of `event_type`, oldest first. `limit`
    /// defaults to `DEFAULT_TYPE_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if the repository cannot be read.
    pub async fn get_by_type(
        &self,
        event_type: &str,
        limit: Option<usize>,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        self.repository
            .get_by_type(event_type, limit.unwrap_or(DEFAULT_TYPE_LIMIT))
            .await
    }

    /// Prepares the backing repository.
    ///
    /// # Errors
    ///
    /// Returns the repository's setup error.
    pub async fn initialize(&self) -> Result<(), EventStoreError> {
        self.repository.initialize().await
    }

    /// Releases the backing repository's resources.
    ///
    /// # Errors
    ///
    /// Returns the repository's shutdown error.
    pub async fn close(&self) -> Result<(), EventStoreError> {
        self.repository.close().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use clinicops_core::error::EventStoreError;
    use clinicops_core::repository::EventRepository;
    use clinicops_test_support::{
        FailingEventRepository, FailingPublisher, FixedClock, PendingPublisher,
        RecordingEventRepository, RecordingPublisher, recv_published,
    };

    use super::{EmitEvent, EventStore};
    use crate::in_memory_event_repository::InMemoryEventRepository;

    fn in_memory_store() -> (EventStore, Arc<InMemoryEventRepository>) {
        let repo = Arc::new(InMemoryEventRepository::new());
        let store = EventStore::new("lead-service", Arc::clone(&repo) as Arc<dyn EventRepository>);
        (store, repo)
    }

    fn lead_created(version: i64) -> EmitEvent {
        EmitEvent::new("LeadCreated", "corr-1", serde_json::json!({"leadId": "L1"}))
            .for_aggregate("L1", version)
    }

    #[tokio::test]
    async fn test_emit_stamps_id_source_and_timestamp() {
        // Arrange
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let (store, repo) = in_memory_store();
        let store = store.with_clock(Arc::new(FixedClock(fixed_now)));

        // Act
        let record = store.emit(lead_created(1)).await.unwrap();

        // Assert
        assert!(!record.id.is_nil());
        assert_eq!(record.event_type, "LeadCreated");
        assert_eq!(record.aggregate_id.as_deref(), Some("L1"));
        assert_eq!(record.version, Some(1));
        assert_eq!(record.payload, serde_json::json!({"leadId": "L1"}));
        assert_eq!(record.metadata.source, "lead-service");
        assert_eq!(record.metadata.timestamp, fixed_now);
        assert_eq!(record.metadata.correlation_id, "corr-1");
        assert_eq!(record.metadata.causation_id, None);

        let stored = repo.get_by_aggregate_id("L1", None).await.unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[tokio::test]
    async fn test_emit_reusing_aggregate_version_fails_with_concurrency_conflict() {
        // Arrange
        let (store, _repo) = in_memory_store();
        store.emit(lead_created(1)).await.unwrap();

        // Act
        let result = store
            .emit(lead_created(1).with_idempotency_key("lead-L1-retry"))
            .await;

        // Assert
        match result {
            Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected_version,
            }) => {
                assert_eq!(aggregate_id, "L1");
                assert_eq!(expected_version, 1);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generated_idempotency_keys_are_traceable_and_unique() {
        // Arrange
        let (store, repo) = in_memory_store();
        let event = EmitEvent::new("CallLogged", "corr-9", serde_json::json!({}));

        // Act
        let first = store.emit(event.clone()).await.unwrap();
        let second = store.emit(event).await.unwrap();

        // Assert
        assert_ne!(first.metadata.idempotency_key, second.metadata.idempotency_key);
        assert!(first.metadata.idempotency_key.starts_with("CallLogged:corr-9:"));
        assert!(first.metadata.idempotency_key.ends_with(&first.id.to_string()));
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_supplied_idempotency_key_deduplicates_and_skips_publishing() {
        // Arrange
        let (mut store, repo) = in_memory_store();
        let (publisher, mut published) = RecordingPublisher::channel();
        store.add_publisher(Arc::new(publisher));
        let event = EmitEvent::new("LeadScored", "corr-2", serde_json::json!({"score": 80}))
            .with_idempotency_key("score-L1-1");

        // Act
        let first = store.emit(event.clone()).await.unwrap();
        let second = store.emit(event).await.unwrap();

        // Assert
        assert_eq!(repo.len().await, 1);
        assert_eq!(second.metadata.idempotency_key, "score-L1-1");
        assert_eq!(recv_published(&mut published).await, first);
        let nothing_more = tokio::time::timeout(Duration::from_millis(100), published.recv()).await;
        assert!(nothing_more.is_err(), "duplicate emit must not publish");
    }

    #[tokio::test]
    async fn test_failing_publisher_does_not_block_other_publishers() {
        // Arrange
        let (mut store, _repo) = in_memory_store();
        let (publisher, mut published) = RecordingPublisher::channel();
        store.add_publisher(Arc::new(FailingPublisher));
        store.add_publisher(Arc::new(publisher));

        // Act
        let record = store.emit(lead_created(1)).await.unwrap();

        // Assert
        assert_eq!(store.publisher_count(), 2);
        assert_eq!(recv_published(&mut published).await, record);
    }

    #[tokio::test]
    async fn test_emit_returns_without_waiting_for_slow_publishers() {
        // Arrange
        let (mut store, _repo) = in_memory_store();
        let (publisher, mut published) = RecordingPublisher::channel();
        store.add_publisher(Arc::new(PendingPublisher));
        store.add_publisher(Arc::new(publisher));

        // Act
        let result =
            tokio::time::timeout(Duration::from_millis(100), store.emit(lead_created(1))).await;

        // Assert
        let record = result.expect("emit waited on a publisher").unwrap();
        assert_eq!(recv_published(&mut published).await, record);
    }

    #[tokio::test]
    async fn test_every_publisher_receives_the_persisted_event() {
        let (mut store, _repo) = in_memory_store();
        let (first, mut first_rx) = RecordingPublisher::channel();
        let (second, mut second_rx) = RecordingPublisher::channel();
        store.add_publisher(Arc::new(first));
        store.add_publisher(Arc::new(second));

        let record = store.emit(lead_created(1)).await.unwrap();

        assert_eq!(recv_published(&mut first_rx).await, record);
        assert_eq!(recv_published(&mut second_rx).await, record);
    }

    #[tokio::test]
    async fn test_emit_rejects_negative_version_before_appending() {
        // Arrange
        let repo = Arc::new(RecordingEventRepository::new());
        let store = EventStore::new("lead-service", Arc::clone(&repo) as Arc<dyn EventRepository>);

        // Act
        let result = store.emit(lead_created(-1)).await;

        // Assert
        assert!(matches!(result, Err(EventStoreError::Validation(_))));
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_emit_passes_fully_populated_record_to_repository() {
        let repo = Arc::new(RecordingEventRepository::new());
        let store = EventStore::new("scheduling", Arc::clone(&repo) as Arc<dyn EventRepository>);

        let record = store
            .emit(
                EmitEvent::new("AppointmentBooked", "corr-3", serde_json::json!({"slot": 4}))
                    .for_aggregate("APT-7", 0)
                    .with_aggregate_type("Appointment")
                    .caused_by("evt-41"),
            )
            .await
            .unwrap();

        let appended = repo.appended_events();
        assert_eq!(appended, vec![record]);
        assert_eq!(appended[0].aggregate_type.as_deref(), Some("Appointment"));
        assert_eq!(appended[0].metadata.causation_id.as_deref(), Some("evt-41"));
        assert_eq!(appended[0].version, Some(0));
    }

    #[tokio::test]
    async fn test_emit_propagates_storage_error_and_publishes_nothing() {
        // Arrange
        let mut store = EventStore::new("lead-service", Arc::new(FailingEventRepository));
        let (publisher, mut published) = RecordingPublisher::channel();
        store.add_publisher(Arc::new(publisher));

        // Act
        let result = store.emit(lead_created(1)).await;

        // Assert
        assert!(matches!(result, Err(EventStoreError::Storage(_))));
        let nothing = tokio::time::timeout(Duration::from_millis(100), published.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_queries_pass_through_to_repository() {
        // Arrange
        let (store, _repo) = in_memory_store();
        for version in [0, 1, 2] {
            store.emit(lead_created(version)).await.unwrap();
        }
        store
            .emit(EmitEvent::new("LeadScored", "corr-2", serde_json::json!({})))
            .await
            .unwrap();

        // Act
        let by_correlation = store.get_by_correlation_id("corr-1").await.unwrap();
        let after_zero = store.get_by_aggregate_id("L1", Some(0)).await.unwrap();
        let by_type = store.get_by_type("LeadCreated", Some(2)).await.unwrap();
        let by_type_default = store.get_by_type("LeadScored", None).await.unwrap();

        // Assert
        assert_eq!(by_correlation.len(), 3);
        let versions: Vec<Option<i64>> = after_zero.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![Some(1), Some(2)]);
        let versions: Vec<Option<i64>> = by_type.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![Some(1), Some(2)]);
        assert_eq!(by_type_default.len(), 1);
    }

    #[tokio::test]
    async fn test_read_errors_propagate_unchanged() {
        let store = EventStore::new("lead-service", Arc::new(FailingEventRepository));

        let result = store.get_by_correlation_id("corr-1").await;

        assert!(matches!(result, Err(EventStoreError::Storage(_))));
    }
}
