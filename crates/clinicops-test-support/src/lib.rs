//! Shared test mocks and utilities for the Clinic Ops event store.

mod clock;
mod publisher;
mod repository;

pub use clock::FixedClock;
pub use publisher::{FailingPublisher, PendingPublisher, RecordingPublisher, recv_published};
pub use repository::{FailingEventRepository, RecordingEventRepository};
