//! Publisher that writes each persisted event to the log.

use async_trait::async_trait;
use tracing::info;

use clinicops_core::error::PublishError;
use clinicops_core::event::EventRecord;
use clinicops_core::publisher::EventPublisher;

/// Logs every published event at `info` level. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: &EventRecord) -> Result<(), PublishError> {
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            aggregate_id = event.aggregate_id.as_deref(),
            version = event.version,
            correlation_id = %event.metadata.correlation_id,
            source = %event.metadata.source,
            "event published"
        );
        Ok(())
    }
}
