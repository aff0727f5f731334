//! ClickHouse backend for the OLAP side.
//!
//! Append-only time-series tables plus the windowed summary queries the
//! agents read. DDL is idempotent (`IF NOT EXISTS`) and safe to run on every
//! startup.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use clickhouse::{Client, Row};
use frameworks_model::{
    ClientQoeSummary, HealthSummary, NodePerfRecord, TenantId, UsageRecord,
};
use serde::Deserialize;
use tracing::info;

use crate::database::ports::{AnalyticsReader, OlapSink};
use crate::error::Result;
use crate::ingest::rows::*;

/// Ordered DDL for the telemetry schema.
const MIGRATIONS: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS stream_events
(
    event_id UUID,
    event_type LowCardinality(String),
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    source LowCardinality(String),
    tenant_id UUID,
    internal_name String,
    node_id Nullable(String),
    status Nullable(String),
    stream_key Nullable(String),
    protocol Nullable(String),
    hostname Nullable(String),
    push_url Nullable(String),
    latitude Nullable(Float64),
    longitude Nullable(Float64),
    location Nullable(String),
    buffer_state Nullable(String),
    downloaded_bytes Nullable(Int64),
    uploaded_bytes Nullable(Int64),
    total_viewers Nullable(Int64),
    total_inputs Nullable(Int64),
    total_outputs Nullable(Int64),
    viewer_seconds Nullable(Int64),
    health_score Nullable(Float64),
    has_issues Nullable(Bool),
    issues_desc Nullable(String),
    track_count Nullable(Int32),
    quality_tier Nullable(String),
    primary_width Nullable(Int32),
    primary_height Nullable(Int32),
    primary_fps Nullable(Float64),
    primary_codec Nullable(String),
    primary_bitrate Nullable(Int64),
    current_rate Nullable(Int64),
    threshold Nullable(Int64),
    threshold_exceeded Nullable(Bool),
    recording_id Nullable(String),
    file_path Nullable(String),
    size_bytes Nullable(Int64),
    duration_seconds Nullable(Int64),
    push_id Nullable(String),
    target_uri Nullable(String),
    bytes_sent Nullable(Int64),
    push_error Nullable(String),
    event_data String CODEC(ZSTD(1))
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (tenant_id, internal_name, timestamp)
TTL toDateTime(timestamp) + INTERVAL 90 DAY DELETE
SETTINGS index_granularity = 8192",
    r"CREATE TABLE IF NOT EXISTS connection_events
(
    event_id UUID,
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    tenant_id UUID,
    internal_name String,
    session_id String,
    action LowCardinality(String),
    seconds_connected Nullable(Int64),
    downloaded_bytes Nullable(Int64),
    uploaded_bytes Nullable(Int64),
    country_code Nullable(String),
    city Nullable(String),
    latitude Nullable(Float64),
    longitude Nullable(Float64),
    event_data String CODEC(ZSTD(1))
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (tenant_id, internal_name, timestamp)
TTL toDateTime(timestamp) + INTERVAL 90 DAY DELETE",
    r"CREATE TABLE IF NOT EXISTS client_metrics
(
    event_id UUID,
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    tenant_id UUID,
    internal_name Nullable(String),
    session_id String,
    event LowCardinality(String),
    buffer_health Nullable(Float64),
    fps Nullable(Float64),
    bitrate Nullable(Int64),
    packet_loss Nullable(Float64),
    bandwidth Nullable(Int64),
    player Nullable(String),
    user_agent Nullable(String),
    event_data String CODEC(ZSTD(1))
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (tenant_id, timestamp)
TTL toDateTime(timestamp) + INTERVAL 90 DAY DELETE",
    r"CREATE TABLE IF NOT EXISTS track_list_events
(
    event_id UUID,
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    tenant_id UUID,
    internal_name String,
    node_id Nullable(String),
    track_count Nullable(Int32),
    track_list String CODEC(ZSTD(1)),
    event_data String CODEC(ZSTD(1))
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (tenant_id, internal_name, timestamp)",
    r"CREATE TABLE IF NOT EXISTS track_change_events
(
    event_id UUID,
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    tenant_id UUID,
    internal_name String,
    previous_tracks String CODEC(ZSTD(1)),
    current_tracks String CODEC(ZSTD(1))
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (tenant_id, internal_name, timestamp)",
    r"CREATE TABLE IF NOT EXISTS node_metrics
(
    event_id UUID,
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    node_id String,
    cluster_id Nullable(String),
    cpu_percent Nullable(Float64),
    ram_used Nullable(Int64),
    ram_total Nullable(Int64),
    disk_used Nullable(Int64),
    disk_total Nullable(Int64),
    bandwidth_in Nullable(Int64),
    bandwidth_out Nullable(Int64),
    stream_count Nullable(Int64),
    status Nullable(String),
    event_data String CODEC(ZSTD(1))
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (node_id, timestamp)
TTL toDateTime(timestamp) + INTERVAL 90 DAY DELETE",
    r"CREATE TABLE IF NOT EXISTS routing_events
(
    event_id UUID,
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    tenant_id Nullable(UUID),
    internal_name Nullable(String),
    selected_node String,
    score Nullable(Float64),
    client_ip Nullable(String),
    country_code Nullable(String),
    latitude Nullable(Float64),
    longitude Nullable(Float64),
    status Nullable(String),
    candidates Nullable(String),
    event_data String CODEC(ZSTD(1))
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (selected_node, timestamp)",
    r"CREATE TABLE IF NOT EXISTS clip_events
(
    event_id UUID,
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    tenant_id UUID,
    internal_name String,
    clip_id String,
    action LowCardinality(String),
    start_offset Nullable(Float64),
    end_offset Nullable(Float64),
    duration Nullable(Float64),
    status Nullable(String),
    error Nullable(String),
    event_data String CODEC(ZSTD(1))
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (tenant_id, internal_name, timestamp)",
    r"CREATE TABLE IF NOT EXISTS stream_health_metrics
(
    event_id UUID,
    timestamp DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    tenant_id UUID,
    internal_name String,
    node_id String,
    buffer_state Nullable(String),
    buffer_health Nullable(Float64),
    health_score Nullable(Float64),
    track_count Nullable(Int32),
    fps Nullable(Float64),
    bitrate Nullable(Int64),
    width Nullable(Int32),
    height Nullable(Int32),
    codec Nullable(String),
    has_issues Nullable(Bool),
    issues_desc Nullable(String)
)
ENGINE = MergeTree
PARTITION BY toDate(timestamp)
ORDER BY (tenant_id, internal_name, timestamp)
TTL toDateTime(timestamp) + INTERVAL 90 DAY DELETE",
    r"CREATE TABLE IF NOT EXISTS agent_usage
(
    recorded_at DateTime64(3, 'UTC') CODEC(Delta, ZSTD(1)),
    tenant_id UUID,
    component LowCardinality(String),
    prompt_tokens UInt64,
    completion_tokens UInt64
)
ENGINE = MergeTree
PARTITION BY toDate(recorded_at)
ORDER BY (tenant_id, recorded_at)",
];

/// OLAP store over the ClickHouse HTTP interface. Row uniqueness per
/// `event_id` is guaranteed by the producer side of the pipeline.
#[derive(Clone)]
pub struct ClickhouseStore {
    client: Client,
}

impl std::fmt::Debug for ClickhouseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickhouseStore").finish_non_exhaustive()
    }
}

impl ClickhouseStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn connect(url: &str, database: &str, user: &str, password: &str) -> Self {
        let client = Client::default()
            .with_url(url)
            .with_database(database)
            .with_user(user)
            .with_password(password);
        Self { client }
    }

    /// Runs the idempotent DDL.
    pub async fn initialize_schema(&self) -> Result<()> {
        for statement in MIGRATIONS {
            self.client.query(statement).execute().await?;
        }
        info!("OLAP schema ready");
        Ok(())
    }

    async fn insert_all<T>(&self, table: &str, rows: Vec<T>) -> Result<()>
    where
        T: Row + serde::Serialize + Send + Sync,
    {
        let mut insert = self.client.insert(table)?;
        for row in &rows {
            insert.write(row).await?;
        }
        insert.end().await?;
        Ok(())
    }
}

#[derive(Debug, Row, Deserialize)]
struct HealthSummaryRow {
    avg_buffer_health: f64,
    avg_fps: f64,
    avg_bitrate: f64,
    total_issue_count: i64,
    sample_count: i64,
}

#[derive(Debug, Row, Deserialize)]
struct QoeSummaryRow {
    avg_packet_loss: f64,
    avg_bandwidth: f64,
    session_count: i64,
}

#[derive(Debug, Row, Deserialize)]
struct PerfRow {
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    bucket: DateTime<Utc>,
    cpu_avg: f64,
    mem_avg: f64,
}

#[async_trait]
impl OlapSink for ClickhouseStore {
    async fn append_stream_events(&self, rows: Vec<StreamEventRow>) -> Result<()> {
        self.insert_all("stream_events", rows).await
    }
    async fn append_connection_events(&self, rows: Vec<ConnectionEventRow>) -> Result<()> {
        self.insert_all("connection_events", rows).await
    }
    async fn append_client_metrics(&self, rows: Vec<ClientMetricRow>) -> Result<()> {
        self.insert_all("client_metrics", rows).await
    }
    async fn append_track_lists(&self, rows: Vec<TrackListRow>) -> Result<()> {
        self.insert_all("track_list_events", rows).await
    }
    async fn append_track_changes(&self, rows: Vec<TrackChangeRow>) -> Result<()> {
        self.insert_all("track_change_events", rows).await
    }
    async fn append_node_metrics(&self, rows: Vec<NodeMetricRow>) -> Result<()> {
        self.insert_all("node_metrics", rows).await
    }
    async fn append_routing_events(&self, rows: Vec<RoutingEventRow>) -> Result<()> {
        self.insert_all("routing_events", rows).await
    }
    async fn append_clip_events(&self, rows: Vec<ClipEventRow>) -> Result<()> {
        self.insert_all("clip_events", rows).await
    }
    async fn append_health_metrics(&self, rows: Vec<StreamHealthMetricRow>) -> Result<()> {
        self.insert_all("stream_health_metrics", rows).await
    }

    async fn record_usage(&self, record: UsageRecord) -> Result<()> {
        self.insert_all("agent_usage", vec![UsageRow::from(record)])
            .await
    }
}

#[async_trait]
impl AnalyticsReader for ClickhouseStore {
    async fn health_summary(
        &self,
        tenant_id: TenantId,
        window: Duration,
    ) -> Result<Option<HealthSummary>> {
        let row = self
            .client
            .query(
                "SELECT
                     toFloat64(coalesce(avgOrNull(buffer_health), 0)) AS avg_buffer_health,
                     toFloat64(coalesce(avgOrNull(fps), 0)) AS avg_fps,
                     toFloat64(coalesce(avgOrNull(bitrate), 0)) AS avg_bitrate,
                     toInt64(countIf(coalesce(has_issues, false))) AS total_issue_count,
                     toInt64(count()) AS sample_count
                 FROM stream_health_metrics
                 WHERE tenant_id = ? AND timestamp >= now() - INTERVAL ? SECOND",
            )
            .bind(tenant_id.to_uuid())
            .bind(window.num_seconds())
            .fetch_one::<HealthSummaryRow>()
            .await?;

        if row.sample_count == 0 {
            return Ok(None);
        }
        Ok(Some(HealthSummary {
            avg_buffer_health: row.avg_buffer_health,
            avg_fps: row.avg_fps,
            avg_bitrate: row.avg_bitrate,
            total_issue_count: row.total_issue_count,
            sample_count: row.sample_count,
        }))
    }

    async fn qoe_summary(
        &self,
        tenant_id: TenantId,
        window: Duration,
    ) -> Result<Option<ClientQoeSummary>> {
        let row = self
            .client
            .query(
                "SELECT
                     toFloat64(coalesce(avgOrNull(packet_loss), 0)) AS avg_packet_loss,
                     toFloat64(coalesce(avgOrNull(bandwidth), 0)) AS avg_bandwidth,
                     toInt64(uniqExact(session_id)) AS session_count
                 FROM client_metrics
                 WHERE tenant_id = ? AND timestamp >= now() - INTERVAL ? SECOND",
            )
            .bind(tenant_id.to_uuid())
            .bind(window.num_seconds())
            .fetch_one::<QoeSummaryRow>()
            .await?;

        if row.session_count == 0 {
            return Ok(None);
        }
        Ok(Some(ClientQoeSummary {
            avg_packet_loss: row.avg_packet_loss,
            avg_bandwidth: row.avg_bandwidth,
            session_count: row.session_count,
        }))
    }

    async fn node_perf_history(
        &self,
        node_id: &str,
        window: Duration,
    ) -> Result<Vec<NodePerfRecord>> {
        let rows = self
            .client
            .query(
                "SELECT
                     toDateTime64(toStartOfFiveMinutes(timestamp), 3, 'UTC') AS bucket,
                     toFloat64(coalesce(avgOrNull(cpu_percent), 0)) AS cpu_avg,
                     toFloat64(coalesce(avgOrNull(
                         if(coalesce(ram_total, 0) > 0, ram_used / ram_total * 100, NULL)
                     ), 0)) AS mem_avg
                 FROM node_metrics
                 WHERE node_id = ? AND timestamp >= now() - INTERVAL ? SECOND
                 GROUP BY bucket
                 ORDER BY bucket ASC",
            )
            .bind(node_id)
            .bind(window.num_seconds())
            .fetch_all::<PerfRow>()
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| NodePerfRecord {
                bucket: r.bucket,
                cpu_avg: r.cpu_avg,
                mem_avg: r.mem_avg,
            })
            .collect())
    }
}
