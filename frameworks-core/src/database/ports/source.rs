use async_trait::async_trait;
use frameworks_model::EventEnvelope;

use crate::error::Result;

/// A partition-like channel of raw telemetry envelopes.
///
/// The broker client behind this stays out of scope; the consumer driver
/// only relies on batches arriving in order and `None` meaning the channel
/// closed.
#[async_trait]
pub trait EventSource: Send {
    async fn next_batch(&mut self) -> Result<Option<Vec<EventEnvelope>>>;
}

/// A channel of raw incident-bus payloads feeding the lookout trigger.
///
/// Payloads arrive as opaque bytes; malformed ones are the trigger's
/// problem (logged and acknowledged), never the source's.
#[async_trait]
pub trait IncidentSource: Send {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>>;
}
