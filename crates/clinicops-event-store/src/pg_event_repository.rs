//! `PostgreSQL` implementation of the `EventRepository` trait.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use clinicops_core::error::EventStoreError;
use clinicops_core::event::{EventMetadata, EventRecord};
use clinicops_core::repository::{AppendOutcome, EventRepository};

use crate::schema;

const MAX_CONNECTIONS: u32 = 10;

const COLUMNS: &str = "id, event_type, aggregate_id, aggregate_type, version, payload, \
     correlation_id, causation_id, idempotency_key, occurred_at, source";

/// Connection settings for `PgEventRepository`.
#[derive(Clone)]
pub struct PgSettings {
    /// `PostgreSQL` connection URL. Required before the first operation.
    pub connection_string: Option<String>,
    /// Table holding one row per event.
    pub table_name: String,
}

impl PgSettings {
    /// Settings for `connection_string` with the default table name.
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            table_name: schema::DEFAULT_TABLE_NAME.to_owned(),
        }
    }
}

impl fmt::Debug for PgSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The connection string may embed credentials.
        f.debug_struct("PgSettings")
            .field("connection_string", &self.connection_string.as_ref().map(|_| "<redacted>"))
            .field("table_name", &self.table_name)
            .finish()
    }
}

#[derive(Debug, Default)]
struct PoolState {
    pool: Option<PgPool>,
    schema_ready: bool,
}

/// Row shape of the events table.
#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    event_type: String,
    aggregate_id: Option<String>,
    aggregate_type: Option<String>,
    version: Option<i64>,
    payload: serde_json::Value,
    correlation_id: String,
    causation_id: Option<String>,
    idempotency_key: String,
    occurred_at: DateTime<Utc>,
    source: String,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            event_type: row.event_type,
            aggregate_id: row.aggregate_id,
            aggregate_type: row.aggregate_type,
            version: row.version,
            payload: row.payload,
            metadata: EventMetadata {
                correlation_id: row.correlation_id,
                causation_id: row.causation_id,
                idempotency_key: row.idempotency_key,
                timestamp: row.occurred_at,
                source: row.source,
            },
        }
    }
}

/// PostgreSQL-backed event repository.
///
/// Uniqueness is enforced entirely by the table's constraints, which keeps
/// the repository correct with many writer processes. The pool is opened
/// and the schema created on first use, or eagerly via `initialize`.
pub struct PgEventRepository {
    connection_string: Option<String>,
    table_name: String,
    stream_constraint: String,
    state: Mutex<PoolState>,
}

impl fmt::Debug for PgEventRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgEventRepository")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

impl PgEventRepository {
    /// Creates a repository that connects lazily using `settings`.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Configuration` if the table name is not a
    /// plain SQL identifier.
    pub fn new(settings: PgSettings) -> Result<Self, EventStoreError> {
        Self::build(settings.connection_string, settings.table_name, None)
    }

    /// Creates a repository over an existing pool. The schema is still
    /// created on first use.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Configuration` if the table name is not a
    /// plain SQL identifier.
    pub fn from_pool(pool: PgPool, table_name: &str) -> Result<Self, EventStoreError> {
        Self::build(None, table_name.to_owned(), Some(pool))
    }

    fn build(
        connection_string: Option<String>,
        table_name: String,
        pool: Option<PgPool>,
    ) -> Result<Self, EventStoreError> {
        schema::validate_table_name(&table_name)?;
        Ok(Self {
            connection_string,
            stream_constraint: schema::aggregate_version_constraint(&table_name),
            table_name,
            state: Mutex::new(PoolState {
                pool,
                schema_ready: false,
            }),
        })
    }

    /// The events table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns `true` while the repository holds an open pool.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.pool.is_some()
    }

    async fn connect(&self) -> Result<PgPool, EventStoreError> {
        let Some(url) = self.connection_string.as_deref() else {
            return Err(EventStoreError::Configuration(
                "PostgreSQL event store requires a connection string".to_owned(),
            ));
        };
        info!(table = %self.table_name, "connecting event store to PostgreSQL");
        PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(EventStoreError::storage)
    }

    async fn create_schema(&self, pool: &PgPool) -> Result<(), EventStoreError> {
        // The borrowed connection goes back to the pool when dropped, on
        // every exit path.
        let mut conn = pool.acquire().await.map_err(EventStoreError::storage)?;
        for statement in schema::create_table_statements(&self.table_name) {
            sqlx::query(&statement)
                .execute(&mut *conn)
                .await
                .map_err(EventStoreError::storage)?;
        }
        info!(table = %self.table_name, "event store schema ready");
        Ok(())
    }

    /// Returns a pool whose schema has been created, connecting first if
    /// needed.
    async fn ready_pool(&self) -> Result<PgPool, EventStoreError> {
        let mut state = self.state.lock().await;
        let pool = if let Some(pool) = &state.pool {
            pool.clone()
        } else {
            let pool = self.connect().await?;
            state.pool = Some(pool.clone());
            pool
        };
        if !state.schema_ready {
            self.create_schema(&pool).await?;
            state.schema_ready = true;
        }
        Ok(pool)
    }

    fn translate_insert_error(&self, err: sqlx::Error, event: &EventRecord) -> EventStoreError {
        let stream_conflict = err.as_database_error().is_some_and(|db_err| {
            db_err.is_unique_violation()
                && db_err.constraint() == Some(self.stream_constraint.as_str())
        });
        if stream_conflict {
            if let Some((aggregate_id, version)) = event.stream_position() {
                warn!(%aggregate_id, version, "aggregate version already taken");
                return EventStoreError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.to_owned(),
                    expected_version: version,
                };
            }
        }
        EventStoreError::storage(err)
    }

    fn rows_to_records(&self, rows: Vec<EventRow>) -> Vec<EventRecord> {
        debug!(table = %self.table_name, rows = rows.len(), "events loaded");
        rows.into_iter().map(EventRecord::from).collect()
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn append(&self, event: &EventRecord) -> Result<AppendOutcome, EventStoreError> {
        let pool = self.ready_pool().await?;
        let sql = format!(
            "INSERT INTO {} ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (idempotency_key) DO NOTHING",
            self.table_name
        );

        let result = sqlx::query(&sql)
            .bind(event.id)
            .bind(&event.event_type)
            .bind(&event.aggregate_id)
            .bind(&event.aggregate_type)
            .bind(event.version)
            .bind(&event.payload)
            .bind(&event.metadata.correlation_id)
            .bind(&event.metadata.causation_id)
            .bind(&event.metadata.idempotency_key)
            .bind(event.metadata.timestamp)
            .bind(&event.metadata.source)
            .execute(&pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                debug!(
                    idempotency_key = %event.metadata.idempotency_key,
                    "duplicate idempotency key, skipping append"
                );
                Ok(AppendOutcome::Duplicate)
            }
            Ok(_) => {
                debug!(event_id = %event.id, event_type = %event.event_type, "event appended");
                Ok(AppendOutcome::Appended)
            }
            Err(err) => Err(self.translate_insert_error(err, event)),
        }
    }

    async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        let pool = self.ready_pool().await?;
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE correlation_id = $1 ORDER BY position",
            self.table_name
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(correlation_id)
            .fetch_all(&pool)
            .await
            .map_err(EventStoreError::storage)?;
        Ok(self.rows_to_records(rows))
    }

    async fn get_by_aggregate_id(
        &self,
        aggregate_id: &str,
        after_version: Option<i64>,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        let pool = self.ready_pool().await?;
        let mut sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE aggregate_id = $1",
            self.table_name
        );
        if after_version.is_some() {
            sql.push_str(" AND COALESCE(version, 0) > $2");
        }
        sql.push_str(" ORDER BY COALESCE(version, 0), position");

        let mut query = sqlx::query_as::<_, EventRow>(&sql).bind(aggregate_id);
        if let Some(after) = after_version {
            query = query.bind(after);
        }
        let rows = query
            .fetch_all(&pool)
            .await
            .map_err(EventStoreError::storage)?;
        Ok(self.rows_to_records(rows))
    }

    async fn get_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        let pool = self.ready_pool().await?;
        let sql = format!(
            "SELECT {COLUMNS} FROM ( \
                 SELECT position, {COLUMNS} FROM {} \
                 WHERE event_type = $1 ORDER BY position DESC LIMIT $2 \
             ) recent ORDER BY position",
            self.table_name
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_type)
            .bind(limit)
            .fetch_all(&pool)
            .await
            .map_err(EventStoreError::storage)?;
        Ok(self.rows_to_records(rows))
    }

    async fn initialize(&self) -> Result<(), EventStoreError> {
        self.ready_pool().await.map(|_| ())
    }

    async fn close(&self) -> Result<(), EventStoreError> {
        let pool = {
            let mut state = self.state.lock().await;
            state.schema_ready = false;
            state.pool.take()
        };
        if let Some(pool) = pool {
            pool.close().await;
            info!(table = %self.table_name, "event store connection pool closed");
        }
        Ok(())
    }
}
