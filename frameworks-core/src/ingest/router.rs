//! The ingest router: a total match over the telemetry union.
//!
//! Every validated event becomes one or more OLAP rows; a handful of
//! variants additionally invoke the reducer. Same-table rows from one batch
//! are committed as a unit, in arrival order; a sink failure fails the batch
//! and surfaces to the caller for retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use frameworks_model::event::{EventMeta, StreamStatePayload, UserConnectionPayload};
use frameworks_model::{EventEnvelope, EventPayload, TelemetryEvent};
use tracing::{debug, warn};

use crate::database::ports::{AggregateStore, OlapSink};
use crate::error::Result;
use crate::ingest::rows::*;
use crate::ingest::validate;

/// Outcome counters for one routed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    pub routed: usize,
    pub dropped: usize,
    pub rows_written: usize,
}

enum ReducerCall<'a> {
    StreamLifecycle(&'a EventMeta, &'a StreamStatePayload),
    UserConnection(&'a EventMeta, &'a UserConnectionPayload),
    StreamEnd(&'a EventMeta, &'a StreamStatePayload),
}

/// Per-table row accumulator for one batch.
#[derive(Default)]
struct RowBatch {
    stream_events: Vec<StreamEventRow>,
    connection_events: Vec<ConnectionEventRow>,
    client_metrics: Vec<ClientMetricRow>,
    track_lists: Vec<TrackListRow>,
    track_changes: Vec<TrackChangeRow>,
    node_metrics: Vec<NodeMetricRow>,
    routing_events: Vec<RoutingEventRow>,
    clip_events: Vec<ClipEventRow>,
    health_metrics: Vec<StreamHealthMetricRow>,
}

impl RowBatch {
    fn len(&self) -> usize {
        self.stream_events.len()
            + self.connection_events.len()
            + self.client_metrics.len()
            + self.track_lists.len()
            + self.track_changes.len()
            + self.node_metrics.len()
            + self.routing_events.len()
            + self.clip_events.len()
            + self.health_metrics.len()
    }
}

pub struct IngestRouter {
    olap: Arc<dyn OlapSink>,
    aggregates: Arc<dyn AggregateStore>,
    invalid_events: AtomicU64,
}

impl std::fmt::Debug for IngestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestRouter")
            .field("invalid_events", &self.invalid_events)
            .finish_non_exhaustive()
    }
}

impl IngestRouter {
    pub fn new(olap: Arc<dyn OlapSink>, aggregates: Arc<dyn AggregateStore>) -> Self {
        Self {
            olap,
            aggregates,
            invalid_events: AtomicU64::new(0),
        }
    }

    /// Validation failures seen so far. Invalid events are counted and
    /// dropped, never propagated.
    pub fn invalid_event_count(&self) -> u64 {
        self.invalid_events.load(Ordering::Relaxed)
    }

    /// Validates and routes one batch of raw envelopes.
    pub async fn ingest(&self, envelopes: Vec<EventEnvelope>) -> Result<RouteStats> {
        let mut events = Vec::with_capacity(envelopes.len());
        let mut dropped = 0usize;
        for envelope in envelopes {
            match validate(envelope) {
                Ok(event) => events.push(event),
                Err(err) => {
                    self.invalid_events.fetch_add(1, Ordering::Relaxed);
                    dropped += 1;
                    warn!(error = %err, "dropping invalid telemetry event");
                }
            }
        }
        let mut stats = self.route_batch(&events).await?;
        stats.dropped += dropped;
        Ok(stats)
    }

    /// Routes validated events: stages per-table rows, commits each table's
    /// batch as a unit, then applies reducer calls in arrival order.
    pub async fn route_batch(&self, events: &[TelemetryEvent]) -> Result<RouteStats> {
        let mut batch = RowBatch::default();
        let mut reductions = Vec::new();

        for event in events {
            self.stage(event, &mut batch, &mut reductions)?;
        }

        let rows_written = batch.len();
        self.commit(batch).await?;

        for call in reductions {
            match call {
                ReducerCall::StreamLifecycle(meta, p) => {
                    self.aggregates.reduce_stream_lifecycle(meta, p).await?
                }
                ReducerCall::UserConnection(meta, p) => {
                    self.aggregates.reduce_user_connection(meta, p).await?
                }
                ReducerCall::StreamEnd(meta, p) => {
                    self.aggregates.reduce_stream_end(meta, p).await?
                }
            }
        }

        debug!(events = events.len(), rows = rows_written, "routed batch");
        Ok(RouteStats {
            routed: events.len(),
            dropped: 0,
            rows_written,
        })
    }

    fn stage<'a>(
        &self,
        event: &'a TelemetryEvent,
        batch: &mut RowBatch,
        reductions: &mut Vec<ReducerCall<'a>>,
    ) -> Result<()> {
        let meta = &event.meta;
        match &event.payload {
            EventPayload::StreamIngest(p) => {
                batch.stream_events.push(StreamEventRow::from_ingest(meta, p)?);
            }
            EventPayload::StreamLifecycle(p) => {
                batch
                    .stream_events
                    .push(StreamEventRow::from_stream_state(meta, "stream-lifecycle", p)?);
                reductions.push(ReducerCall::StreamLifecycle(meta, p));
            }
            EventPayload::StreamBuffer(p) => {
                batch
                    .stream_events
                    .push(StreamEventRow::from_stream_state(meta, "stream-buffer", p)?);
                batch
                    .health_metrics
                    .push(StreamHealthMetricRow::from_buffer(meta, p));
            }
            EventPayload::StreamEnd(p) => {
                batch
                    .stream_events
                    .push(StreamEventRow::from_stream_state(meta, "stream-end", p)?);
                reductions.push(ReducerCall::StreamEnd(meta, p));
            }
            EventPayload::StreamView(p) => {
                batch.stream_events.push(StreamEventRow::from_view(meta, p)?);
            }
            EventPayload::UserConnection(p) => {
                batch
                    .connection_events
                    .push(ConnectionEventRow::from_payload(meta, p)?);
                reductions.push(ReducerCall::UserConnection(meta, p));
            }
            EventPayload::ClientLifecycle(p) => {
                batch
                    .client_metrics
                    .push(ClientMetricRow::from_payload(meta, p)?);
            }
            EventPayload::TrackList(p) => {
                batch.track_lists.push(TrackListRow::from_payload(meta, p)?);
                if let Some(change) = TrackChangeRow::from_payload(meta, p)? {
                    batch.track_changes.push(change);
                }
            }
            EventPayload::BandwidthThreshold(p) => {
                batch
                    .stream_events
                    .push(StreamEventRow::from_bandwidth_threshold(meta, p)?);
            }
            EventPayload::RecordingLifecycle(p) => {
                batch
                    .stream_events
                    .push(StreamEventRow::from_recording(meta, p)?);
            }
            EventPayload::PushLifecycle(p) => {
                batch.stream_events.push(StreamEventRow::from_push(meta, p)?);
            }
            EventPayload::NodeLifecycle(p) => {
                batch.node_metrics.push(NodeMetricRow::from_payload(meta, p)?);
            }
            EventPayload::LoadBalancing(p) => {
                batch
                    .routing_events
                    .push(RoutingEventRow::from_payload(meta, p)?);
            }
            EventPayload::ClipLifecycle(p) => {
                batch.clip_events.push(ClipEventRow::from_payload(meta, p)?);
            }
        }
        Ok(())
    }

    async fn commit(&self, batch: RowBatch) -> Result<()> {
        if !batch.stream_events.is_empty() {
            self.olap.append_stream_events(batch.stream_events).await?;
        }
        if !batch.connection_events.is_empty() {
            self.olap
                .append_connection_events(batch.connection_events)
                .await?;
        }
        if !batch.client_metrics.is_empty() {
            self.olap.append_client_metrics(batch.client_metrics).await?;
        }
        if !batch.track_lists.is_empty() {
            self.olap.append_track_lists(batch.track_lists).await?;
        }
        if !batch.track_changes.is_empty() {
            self.olap.append_track_changes(batch.track_changes).await?;
        }
        if !batch.node_metrics.is_empty() {
            self.olap.append_node_metrics(batch.node_metrics).await?;
        }
        if !batch.routing_events.is_empty() {
            self.olap.append_routing_events(batch.routing_events).await?;
        }
        if !batch.clip_events.is_empty() {
            self.olap.append_clip_events(batch.clip_events).await?;
        }
        if !batch.health_metrics.is_empty() {
            self.olap.append_health_metrics(batch.health_metrics).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::{MemoryAggregateStore, MemoryOlapSink};
    use chrono::Utc;
    use frameworks_model::TenantId;
    use serde_json::json;
    use uuid::Uuid;

    fn envelope(event_type: &str, data: serde_json::Value) -> EventEnvelope {
        EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            source: "helmsman".to_string(),
            tenant_id: None,
            internal_name: None,
            schema_version: "1.0".to_string(),
            data,
        }
    }

    fn router() -> (Arc<MemoryOlapSink>, Arc<MemoryAggregateStore>, IngestRouter) {
        let olap = Arc::new(MemoryOlapSink::default());
        let aggregates = Arc::new(MemoryAggregateStore::new());
        let router = IngestRouter::new(olap.clone(), aggregates.clone());
        (olap, aggregates, router)
    }

    #[tokio::test]
    async fn buffer_event_fans_out_to_two_tables() {
        let (olap, _, router) = router();
        let tenant = TenantId::new();

        let stats = router
            .ingest(vec![envelope(
                "stream-buffer",
                json!({
                    "tenant_id": tenant,
                    "internal_name": "live+demo",
                    "node_id": "node-1",
                    "status": "FULL",
                    "buffer_state": "FULL",
                    "health_score": 0.97,
                }),
            )])
            .await
            .unwrap();

        assert_eq!(stats.routed, 1);
        assert_eq!(stats.rows_written, 2);
        assert_eq!(olap.stream_events().len(), 1);
        assert_eq!(olap.health_metrics().len(), 1);
        assert_eq!(olap.stream_events()[0].event_type, "stream-buffer");
    }

    #[tokio::test]
    async fn connection_event_reaches_reducer() {
        let (olap, aggregates, router) = router();
        let tenant = TenantId::new();

        router
            .ingest(vec![envelope(
                "user-connection",
                json!({
                    "tenant_id": tenant,
                    "internal_name": "live+demo",
                    "session_id": "sess-1",
                    "action": "connect",
                }),
            )])
            .await
            .unwrap();

        assert_eq!(olap.connection_events().len(), 1);
        let agg = aggregates.fetch(tenant, "live+demo").await.unwrap().unwrap();
        assert_eq!(agg.current_viewers, 1);
        assert_eq!(agg.total_connections, 1);
    }

    #[tokio::test]
    async fn invalid_events_are_counted_and_dropped() {
        let (olap, _, router) = router();

        let stats = router
            .ingest(vec![
                envelope("no-such-event", json!({})),
                envelope(
                    "stream-view",
                    json!({ "tenant_id": TenantId::new(), "internal_name": "live+demo" }),
                ),
            ])
            .await
            .unwrap();

        assert_eq!(stats.routed, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(router.invalid_event_count(), 1);
        assert_eq!(olap.stream_events().len(), 1);
    }

    #[tokio::test]
    async fn track_change_emitted_only_on_difference() {
        let (olap, _, router) = router();
        let tenant = TenantId::new();

        router
            .ingest(vec![
                envelope(
                    "track-list",
                    json!({
                        "tenant_id": tenant,
                        "internal_name": "live+demo",
                        "track_list": [{"id": 1, "codec": "h264"}],
                        "previous_track_list": [{"id": 1, "codec": "h264"}],
                    }),
                ),
                envelope(
                    "track-list",
                    json!({
                        "tenant_id": tenant,
                        "internal_name": "live+demo",
                        "track_list": [{"id": 1, "codec": "h264"}, {"id": 2, "codec": "aac"}],
                        "previous_track_list": [{"id": 1, "codec": "h264"}],
                    }),
                ),
            ])
            .await
            .unwrap();

        assert_eq!(olap.track_lists().len(), 2);
        assert_eq!(olap.track_changes().len(), 1);
    }

    #[tokio::test]
    async fn push_variants_split_by_action() {
        let (olap, _, router) = router();
        let tenant = TenantId::new();

        router
            .ingest(vec![
                envelope(
                    "push-lifecycle",
                    json!({
                        "tenant_id": tenant,
                        "internal_name": "live+demo",
                        "action": "start",
                        "target_uri": "rtmp://relay.example/live",
                    }),
                ),
                envelope(
                    "push-lifecycle",
                    json!({
                        "tenant_id": tenant,
                        "internal_name": "live+demo",
                        "action": "end",
                        "bytes_sent": 1024,
                    }),
                ),
            ])
            .await
            .unwrap();

        let events = olap.stream_events();
        assert_eq!(events[0].event_type, "push-start");
        assert_eq!(events[1].event_type, "push-end");
        assert_eq!(events[1].bytes_sent, Some(1024));
    }
}
