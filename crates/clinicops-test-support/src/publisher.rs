//! Test publishers — `EventPublisher` implementations for fan-out tests.

use std::time::Duration;

use async_trait::async_trait;
use clinicops_core::error::PublishError;
use clinicops_core::event::EventRecord;
use clinicops_core::publisher::EventPublisher;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// How long `recv_published` waits before failing the test.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

/// A publisher that forwards every event it receives to a channel, so tests
/// can await delivery from the detached publish tasks.
#[derive(Debug)]
pub struct RecordingPublisher {
    sender: UnboundedSender<EventRecord>,
}

impl RecordingPublisher {
    /// Creates the publisher and the receiver its events arrive on.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<EventRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &EventRecord) -> Result<(), PublishError> {
        self.sender
            .send(event.clone())
            .map_err(|e| PublishError(e.to_string()))
    }
}

/// Waits for the next event a `RecordingPublisher` received.
///
/// # Panics
///
/// Panics if nothing arrives within two seconds or the publisher is gone.
pub async fn recv_published(receiver: &mut UnboundedReceiver<EventRecord>) -> EventRecord {
    tokio::time::timeout(PUBLISH_TIMEOUT, receiver.recv())
        .await
        .expect("timed out waiting for a published event")
        .expect("publisher channel closed")
}

/// A publisher that always fails.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: &EventRecord) -> Result<(), PublishError> {
        Err(PublishError("subscriber unavailable".into()))
    }
}

/// A publisher whose `publish` never completes.
#[derive(Debug)]
pub struct PendingPublisher;

#[async_trait]
impl EventPublisher for PendingPublisher {
    async fn publish(&self, _event: &EventRecord) -> Result<(), PublishError> {
        std::future::pending().await
    }
}
