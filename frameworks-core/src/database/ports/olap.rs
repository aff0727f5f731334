use async_trait::async_trait;
use frameworks_model::UsageRecord;

use crate::error::Result;
use crate::ingest::rows::{
    ClientMetricRow, ClipEventRow, ConnectionEventRow, NodeMetricRow, RoutingEventRow,
    StreamEventRow, StreamHealthMetricRow, TrackChangeRow, TrackListRow,
};

/// Write side of the OLAP store.
///
/// Each call commits one batch to one append-only table; a failure fails the
/// batch as a unit and the consumer framework retries. Rows sharing an
/// `event_id` are deduplicated by the store.
#[async_trait]
pub trait OlapSink: Send + Sync {
    async fn append_stream_events(&self, rows: Vec<StreamEventRow>) -> Result<()>;
    async fn append_connection_events(&self, rows: Vec<ConnectionEventRow>) -> Result<()>;
    async fn append_client_metrics(&self, rows: Vec<ClientMetricRow>) -> Result<()>;
    async fn append_track_lists(&self, rows: Vec<TrackListRow>) -> Result<()>;
    async fn append_track_changes(&self, rows: Vec<TrackChangeRow>) -> Result<()>;
    async fn append_node_metrics(&self, rows: Vec<NodeMetricRow>) -> Result<()>;
    async fn append_routing_events(&self, rows: Vec<RoutingEventRow>) -> Result<()>;
    async fn append_clip_events(&self, rows: Vec<ClipEventRow>) -> Result<()>;
    async fn append_health_metrics(&self, rows: Vec<StreamHealthMetricRow>) -> Result<()>;

    /// Token accounting for orchestrator calls; written regardless of the
    /// call's outcome.
    async fn record_usage(&self, record: UsageRecord) -> Result<()>;
}
