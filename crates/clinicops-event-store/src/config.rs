//! Event store configuration and backend selection.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use clinicops_core::error::EventStoreError;
use clinicops_core::repository::EventRepository;

use crate::in_memory_event_repository::InMemoryEventRepository;
use crate::pg_event_repository::{PgEventRepository, PgSettings};
use crate::schema::{self, DEFAULT_TABLE_NAME};
use crate::store::EventStore;

/// Environment variable naming the emitting subsystem.
pub const SOURCE_VAR: &str = "EVENT_SOURCE";
/// Environment variable holding the `PostgreSQL` connection URL.
pub const CONNECTION_STRING_VAR: &str = "DATABASE_URL";
/// Environment variable overriding the events table name.
pub const TABLE_NAME_VAR: &str = "EVENT_TABLE_NAME";

/// Storage engine behind an `EventStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Process-local, non-durable log.
    InMemory,
    /// Durable `PostgreSQL` table.
    Postgres,
}

/// Settings for building an `EventStore`.
#[derive(Clone, PartialEq, Eq)]
pub struct EventStoreConfig {
    /// Stamped as `metadata.source` on every emitted event.
    pub source: String,
    /// Selects the `PostgreSQL` backend when present.
    pub connection_string: Option<String>,
    /// Events table; defaults to `DEFAULT_TABLE_NAME`. Ignored without a
    /// connection string.
    pub table_name: Option<String>,
}

impl fmt::Debug for EventStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStoreConfig")
            .field("source", &self.source)
            .field("connection_string", &self.connection_string.as_ref().map(|_| "<redacted>"))
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl EventStoreConfig {
    /// In-memory configuration for `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            connection_string: None,
            table_name: None,
        }
    }

    /// Switches to the `PostgreSQL` backend.
    #[must_use]
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Overrides the events table name.
    #[must_use]
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Reads `EVENT_SOURCE`, `DATABASE_URL` and `EVENT_TABLE_NAME`.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Configuration` if `EVENT_SOURCE` is unset.
    pub fn from_env() -> Result<Self, EventStoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Configuration` if the source is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EventStoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let source = read(SOURCE_VAR).ok_or_else(|| {
            EventStoreError::Configuration(format!("{SOURCE_VAR} environment variable must be set"))
        })?;

        Ok(Self {
            source,
            connection_string: read(CONNECTION_STRING_VAR),
            table_name: read(TABLE_NAME_VAR),
        })
    }

    /// The backend this configuration selects.
    #[must_use]
    pub fn backend(&self) -> Backend {
        if self.connection_string.is_some() {
            Backend::Postgres
        } else {
            Backend::InMemory
        }
    }

    /// The configured table name, or the default.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.table_name.as_deref().unwrap_or(DEFAULT_TABLE_NAME)
    }
}

/// Builds an `EventStore` wired to the backend `config` selects.
///
/// The `PostgreSQL` backend connects lazily; call `EventStore::initialize`
/// to connect and create the schema up front.
///
/// # Errors
///
/// Returns `EventStoreError::Configuration` for an empty source or an
/// invalid table name.
pub fn build_event_store(config: &EventStoreConfig) -> Result<EventStore, EventStoreError> {
    if config.source.trim().is_empty() {
        return Err(EventStoreError::Configuration(
            "event source must not be empty".to_owned(),
        ));
    }

    let repository: Arc<dyn EventRepository> = match config.backend() {
        Backend::InMemory => Arc::new(InMemoryEventRepository::new()),
        Backend::Postgres => {
            schema::validate_table_name(config.table_name())?;
            Arc::new(PgEventRepository::new(PgSettings {
                connection_string: config.connection_string.clone(),
                table_name: config.table_name().to_owned(),
            })?)
        }
    };

    info!(source = %config.source, backend = ?config.backend(), "event store configured");
    Ok(EventStore::new(config.source.clone(), repository))
}
