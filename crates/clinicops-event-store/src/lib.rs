//! Clinic Ops event store.
//!
//! Provides the `EventStore` facade over two interchangeable repositories:
//! an in-process log for tests and single-node use, and a `PostgreSQL`
//! table for durable, multi-process deployments. `config::build_event_store`
//! is the only place the backend is chosen.

pub mod config;
pub mod in_memory_event_repository;
pub mod pg_event_repository;
pub mod schema;
pub mod store;
pub mod tracing_publisher;

pub use config::{Backend, EventStoreConfig, build_event_store};
pub use in_memory_event_repository::InMemoryEventRepository;
pub use pg_event_repository::{PgEventRepository, PgSettings};
pub use store::{EmitEvent, EventStore};
pub use tracing_publisher::TracingPublisher;
