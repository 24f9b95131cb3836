//! Event store database schema.

use clinicops_core::error::EventStoreError;

/// Table used when the configuration does not name one.
pub const DEFAULT_TABLE_NAME: &str = "domain_events";

/// Longest accepted table name. Leaves room for constraint and index
/// suffixes within `PostgreSQL`'s 63-byte identifier limit.
const MAX_TABLE_NAME_LEN: usize = 40;

/// Validates a table name so it can be interpolated into SQL.
///
/// # Errors
///
/// Returns `EventStoreError::Configuration` unless the name is a plain
/// identifier: an ASCII letter or underscore followed by ASCII letters,
/// digits or underscores.
pub fn validate_table_name(table_name: &str) -> Result<(), EventStoreError> {
    let mut chars = table_name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest {
        return Err(EventStoreError::Configuration(format!(
            "invalid event table name {table_name:?}"
        )));
    }
    if table_name.len() > MAX_TABLE_NAME_LEN {
        return Err(EventStoreError::Configuration(format!(
            "event table name {table_name:?} exceeds {MAX_TABLE_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Name of the unique constraint on `(aggregate_id, version)`, as
/// `PostgreSQL` reports it.
///
/// Identifiers are interpolated unquoted, so the server folds them to lower
/// case; error constraint names come back folded too.
#[must_use]
pub fn aggregate_version_constraint(table_name: &str) -> String {
    format!("{}_aggregate_version_key", table_name.to_ascii_lowercase())
}

/// SQL statements creating the events table, its constraints and indexes.
///
/// Every statement is idempotent. `PostgreSQL` treats `NULL`s as distinct in
/// unique constraints, so rows without an aggregate id or version never
/// collide on the stream constraint.
#[must_use]
pub fn create_table_statements(table_name: &str) -> Vec<String> {
    let stream_constraint = aggregate_version_constraint(table_name);
    vec![
        format!(
            r"
CREATE TABLE IF NOT EXISTS {table_name} (
    position        BIGSERIAL NOT NULL,
    id              UUID PRIMARY KEY,
    event_type      VARCHAR(255) NOT NULL,
    aggregate_id    VARCHAR(255),
    aggregate_type  VARCHAR(255),
    version         BIGINT,
    payload         JSONB NOT NULL,
    correlation_id  VARCHAR(255) NOT NULL,
    causation_id    VARCHAR(255),
    idempotency_key VARCHAR(512) NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL,
    source          VARCHAR(255) NOT NULL,
    CONSTRAINT {table_name}_idempotency_key_key UNIQUE (idempotency_key),
    CONSTRAINT {stream_constraint} UNIQUE (aggregate_id, version)
)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table_name}_correlation_id ON {table_name} (correlation_id, position)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table_name}_event_type ON {table_name} (event_type, position)"
        ),
    ]
}
