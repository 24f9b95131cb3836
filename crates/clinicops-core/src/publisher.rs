//! Publisher port for downstream subscribers.

use async_trait::async_trait;

use crate::error::PublishError;
use crate::event::EventRecord;

/// Receives every successfully persisted event.
///
/// Delivery is best-effort: a failing publisher is logged and skipped, never
/// retried, and never affects the outcome of the write that produced the
/// event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver one persisted event.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` when delivery fails.
    async fn publish(&self, event: &EventRecord) -> Result<(), PublishError>;
}
