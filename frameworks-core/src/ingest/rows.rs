//! OLAP row types and the variant → column mapping.
//!
//! One struct per append-only table. Field order matches the DDL column
//! order (the ClickHouse backend writes RowBinary). Every row also carries
//! the full payload serialized into an `event_data` JSON column for forensic
//! recovery.

use chrono::{DateTime, Utc};
use clickhouse::Row;
use frameworks_model::event::*;
use frameworks_model::UsageRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Wide row for the `stream_events` table. Which columns are populated
/// depends on `event_type`; the rest stay NULL.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct StreamEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    pub event_type: String,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(with = "clickhouse::serde::uuid")]
    pub tenant_id: Uuid,
    pub internal_name: String,
    pub node_id: Option<String>,
    pub status: Option<String>,
    pub stream_key: Option<String>,
    pub protocol: Option<String>,
    pub hostname: Option<String>,
    pub push_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
    pub buffer_state: Option<String>,
    pub downloaded_bytes: Option<i64>,
    pub uploaded_bytes: Option<i64>,
    pub total_viewers: Option<i64>,
    pub total_inputs: Option<i64>,
    pub total_outputs: Option<i64>,
    pub viewer_seconds: Option<i64>,
    pub health_score: Option<f64>,
    pub has_issues: Option<bool>,
    pub issues_desc: Option<String>,
    pub track_count: Option<i32>,
    pub quality_tier: Option<String>,
    pub primary_width: Option<i32>,
    pub primary_height: Option<i32>,
    pub primary_fps: Option<f64>,
    pub primary_codec: Option<String>,
    pub primary_bitrate: Option<i64>,
    pub current_rate: Option<i64>,
    pub threshold: Option<i64>,
    pub threshold_exceeded: Option<bool>,
    pub recording_id: Option<String>,
    pub file_path: Option<String>,
    pub size_bytes: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub push_id: Option<String>,
    pub target_uri: Option<String>,
    pub bytes_sent: Option<i64>,
    pub push_error: Option<String>,
    pub event_data: String,
}

impl StreamEventRow {
    /// Envelope columns plus NULLs everywhere; builders fill in the variant
    /// columns.
    fn base(
        meta: &EventMeta,
        event_type: &str,
        tenant_id: Uuid,
        internal_name: &str,
        event_data: String,
    ) -> Self {
        Self {
            event_id: meta.event_id,
            event_type: event_type.to_string(),
            timestamp: meta.timestamp,
            source: meta.source.clone(),
            tenant_id,
            internal_name: internal_name.to_string(),
            node_id: None,
            status: None,
            stream_key: None,
            protocol: None,
            hostname: None,
            push_url: None,
            latitude: None,
            longitude: None,
            location: None,
            buffer_state: None,
            downloaded_bytes: None,
            uploaded_bytes: None,
            total_viewers: None,
            total_inputs: None,
            total_outputs: None,
            viewer_seconds: None,
            health_score: None,
            has_issues: None,
            issues_desc: None,
            track_count: None,
            quality_tier: None,
            primary_width: None,
            primary_height: None,
            primary_fps: None,
            primary_codec: None,
            primary_bitrate: None,
            current_rate: None,
            threshold: None,
            threshold_exceeded: None,
            recording_id: None,
            file_path: None,
            size_bytes: None,
            duration_seconds: None,
            push_id: None,
            target_uri: None,
            bytes_sent: None,
            push_error: None,
            event_data,
        }
    }

    pub fn from_ingest(meta: &EventMeta, p: &StreamIngestPayload) -> Result<Self> {
        let mut row = Self::base(
            meta,
            "stream-ingest",
            p.tenant_id.to_uuid(),
            &p.internal_name,
            serde_json::to_string(p)?,
        );
        row.node_id = Some(p.node_id.clone());
        row.stream_key = Some(p.stream_key.clone());
        row.protocol = p.protocol.clone();
        row.hostname = p.hostname.clone();
        row.push_url = p.push_url.clone();
        row.latitude = p.latitude;
        row.longitude = p.longitude;
        row.location = p.location.clone();
        Ok(row)
    }

    pub fn from_stream_state(
        meta: &EventMeta,
        event_type: &str,
        p: &StreamStatePayload,
    ) -> Result<Self> {
        let mut row = Self::base(
            meta,
            event_type,
            p.tenant_id.to_uuid(),
            &p.internal_name,
            serde_json::to_string(p)?,
        );
        row.node_id = Some(p.node_id.clone());
        row.status = Some(p.status.clone());
        row.buffer_state = p.buffer_state.clone();
        row.downloaded_bytes = p.downloaded_bytes;
        row.uploaded_bytes = p.uploaded_bytes;
        row.total_viewers = p.total_viewers;
        row.total_inputs = p.total_inputs;
        row.total_outputs = p.total_outputs;
        row.viewer_seconds = p.viewer_seconds;
        row.health_score = p.health_score;
        row.has_issues = p.has_issues;
        row.issues_desc = p.issues_desc.clone();
        row.track_count = p.track_count;
        row.quality_tier = p.quality_tier.clone();
        row.primary_width = p.primary_width;
        row.primary_height = p.primary_height;
        row.primary_fps = p.primary_fps;
        row.primary_codec = p.primary_codec.clone();
        row.primary_bitrate = p.primary_bitrate;
        Ok(row)
    }

    pub fn from_view(meta: &EventMeta, p: &StreamViewPayload) -> Result<Self> {
        let mut row = Self::base(
            meta,
            "stream-view",
            p.tenant_id.to_uuid(),
            &p.internal_name,
            serde_json::to_string(p)?,
        );
        row.node_id = p.node_id.clone();
        Ok(row)
    }

    pub fn from_bandwidth_threshold(
        meta: &EventMeta,
        p: &BandwidthThresholdPayload,
    ) -> Result<Self> {
        let mut row = Self::base(
            meta,
            "bandwidth-threshold",
            p.tenant_id.to_uuid(),
            p.internal_name.as_deref().unwrap_or_default(),
            serde_json::to_string(p)?,
        );
        row.node_id = Some(p.node_id.clone());
        row.current_rate = p.current_rate;
        row.threshold = p.threshold;
        row.threshold_exceeded = p.exceeded;
        Ok(row)
    }

    pub fn from_recording(meta: &EventMeta, p: &RecordingLifecyclePayload) -> Result<Self> {
        let mut row = Self::base(
            meta,
            "recording-lifecycle",
            p.tenant_id.to_uuid(),
            &p.internal_name,
            serde_json::to_string(p)?,
        );
        row.node_id = p.node_id.clone();
        row.status = Some(p.action.clone());
        row.recording_id = p.recording_id.clone();
        row.file_path = p.file_path.clone();
        row.size_bytes = p.size_bytes;
        row.duration_seconds = p.duration_seconds;
        Ok(row)
    }

    pub fn from_push(meta: &EventMeta, p: &PushLifecyclePayload) -> Result<Self> {
        let event_type = match p.action() {
            PushAction::Start => "push-start",
            PushAction::End => "push-end",
        };
        let mut row = Self::base(
            meta,
            event_type,
            p.tenant_id.to_uuid(),
            &p.internal_name,
            serde_json::to_string(p)?,
        );
        row.node_id = p.node_id.clone();
        row.push_id = p.push_id.clone();
        row.target_uri = p.target_uri.clone();
        if p.action() == PushAction::End {
            row.bytes_sent = p.bytes_sent;
            row.duration_seconds = p.duration_seconds;
            row.push_error = p.error.clone();
        }
        Ok(row)
    }
}

/// Row for the `connection_events` table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ConnectionEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::uuid")]
    pub tenant_id: Uuid,
    pub internal_name: String,
    pub session_id: String,
    pub action: String,
    pub seconds_connected: Option<i64>,
    pub downloaded_bytes: Option<i64>,
    pub uploaded_bytes: Option<i64>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub event_data: String,
}

impl ConnectionEventRow {
    pub fn from_payload(meta: &EventMeta, p: &UserConnectionPayload) -> Result<Self> {
        let action = match p.action {
            ConnectionAction::Connect => "connect",
            ConnectionAction::Disconnect => "disconnect",
        };
        Ok(Self {
            event_id: meta.event_id,
            timestamp: meta.timestamp,
            tenant_id: p.tenant_id.to_uuid(),
            internal_name: p.internal_name.clone(),
            session_id: p.session_id.clone(),
            action: action.to_string(),
            seconds_connected: p.seconds_connected,
            downloaded_bytes: p.downloaded_bytes,
            uploaded_bytes: p.uploaded_bytes,
            country_code: p.country_code.clone(),
            city: p.city.clone(),
            latitude: p.latitude,
            longitude: p.longitude,
            event_data: serde_json::to_string(p)?,
        })
    }
}

/// Row for the `client_metrics` table, the QoE source.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ClientMetricRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::uuid")]
    pub tenant_id: Uuid,
    pub internal_name: Option<String>,
    pub session_id: String,
    pub event: String,
    pub buffer_health: Option<f64>,
    pub fps: Option<f64>,
    pub bitrate: Option<i64>,
    pub packet_loss: Option<f64>,
    pub bandwidth: Option<i64>,
    pub player: Option<String>,
    pub user_agent: Option<String>,
    pub event_data: String,
}

impl ClientMetricRow {
    pub fn from_payload(meta: &EventMeta, p: &ClientLifecyclePayload) -> Result<Self> {
        Ok(Self {
            event_id: meta.event_id,
            timestamp: meta.timestamp,
            tenant_id: p.tenant_id.to_uuid(),
            internal_name: p.internal_name.clone(),
            session_id: p.session_id.clone(),
            event: p.event.clone(),
            buffer_health: p.buffer_health,
            fps: p.fps,
            bitrate: p.bitrate,
            packet_loss: p.packet_loss,
            bandwidth: p.bandwidth,
            player: p.player.clone(),
            user_agent: p.user_agent.clone(),
            event_data: serde_json::to_string(p)?,
        })
    }
}

/// Row for the `track_list_events` table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct TrackListRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::uuid")]
    pub tenant_id: Uuid,
    pub internal_name: String,
    pub node_id: Option<String>,
    pub track_count: Option<i32>,
    pub track_list: String,
    pub event_data: String,
}

impl TrackListRow {
    pub fn from_payload(meta: &EventMeta, p: &TrackListPayload) -> Result<Self> {
        Ok(Self {
            event_id: meta.event_id,
            timestamp: meta.timestamp,
            tenant_id: p.tenant_id.to_uuid(),
            internal_name: p.internal_name.clone(),
            node_id: p.node_id.clone(),
            track_count: p.track_count,
            track_list: serde_json::to_string(&p.track_list)?,
            event_data: serde_json::to_string(p)?,
        })
    }
}

/// Row for the `track_change_events` table, emitted when a track-list event
/// carries a differing previous inventory.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct TrackChangeRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::uuid")]
    pub tenant_id: Uuid,
    pub internal_name: String,
    pub previous_tracks: String,
    pub current_tracks: String,
}

impl TrackChangeRow {
    /// `None` when the payload carries no previous inventory or it matches
    /// the current one.
    pub fn from_payload(meta: &EventMeta, p: &TrackListPayload) -> Result<Option<Self>> {
        let Some(previous) = &p.previous_track_list else {
            return Ok(None);
        };
        if *previous == p.track_list {
            return Ok(None);
        }
        Ok(Some(Self {
            event_id: meta.event_id,
            timestamp: meta.timestamp,
            tenant_id: p.tenant_id.to_uuid(),
            internal_name: p.internal_name.clone(),
            previous_tracks: serde_json::to_string(previous)?,
            current_tracks: serde_json::to_string(&p.track_list)?,
        }))
    }
}

/// Row for the `node_metrics` table, the infra monitor's rollup source.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct NodeMetricRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub cluster_id: Option<String>,
    pub cpu_percent: Option<f64>,
    pub ram_used: Option<i64>,
    pub ram_total: Option<i64>,
    pub disk_used: Option<i64>,
    pub disk_total: Option<i64>,
    pub bandwidth_in: Option<i64>,
    pub bandwidth_out: Option<i64>,
    pub stream_count: Option<i64>,
    pub status: Option<String>,
    pub event_data: String,
}

impl NodeMetricRow {
    pub fn from_payload(meta: &EventMeta, p: &NodeLifecyclePayload) -> Result<Self> {
        Ok(Self {
            event_id: meta.event_id,
            timestamp: meta.timestamp,
            node_id: p.node_id.clone(),
            cluster_id: p.cluster_id.clone(),
            cpu_percent: p.cpu_percent,
            ram_used: p.ram_used,
            ram_total: p.ram_total,
            disk_used: p.disk_used,
            disk_total: p.disk_total,
            bandwidth_in: p.bandwidth_in,
            bandwidth_out: p.bandwidth_out,
            stream_count: p.stream_count,
            status: p.status.clone(),
            event_data: serde_json::to_string(p)?,
        })
    }
}

/// Row for the `routing_events` table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct RoutingEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::uuid::option")]
    pub tenant_id: Option<Uuid>,
    pub internal_name: Option<String>,
    pub selected_node: String,
    pub score: Option<f64>,
    pub client_ip: Option<String>,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Option<String>,
    pub candidates: Option<String>,
    pub event_data: String,
}

impl RoutingEventRow {
    pub fn from_payload(meta: &EventMeta, p: &LoadBalancingPayload) -> Result<Self> {
        Ok(Self {
            event_id: meta.event_id,
            timestamp: meta.timestamp,
            tenant_id: p.tenant_id.map(|t| t.to_uuid()),
            internal_name: p.internal_name.clone(),
            selected_node: p.selected_node.clone(),
            score: p.score,
            client_ip: p.client_ip.clone(),
            country_code: p.country_code.clone(),
            latitude: p.latitude,
            longitude: p.longitude,
            status: p.status.clone(),
            candidates: p
                .candidates
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            event_data: serde_json::to_string(p)?,
        })
    }
}

/// Row for the `clip_events` table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ClipEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::uuid")]
    pub tenant_id: Uuid,
    pub internal_name: String,
    pub clip_id: String,
    pub action: String,
    pub start_offset: Option<f64>,
    pub end_offset: Option<f64>,
    pub duration: Option<f64>,
    pub status: Option<String>,
    pub error: Option<String>,
    pub event_data: String,
}

impl ClipEventRow {
    pub fn from_payload(meta: &EventMeta, p: &ClipLifecyclePayload) -> Result<Self> {
        Ok(Self {
            event_id: meta.event_id,
            timestamp: meta.timestamp,
            tenant_id: p.tenant_id.to_uuid(),
            internal_name: p.internal_name.clone(),
            clip_id: p.clip_id.clone(),
            action: p.action.clone(),
            start_offset: p.start_offset,
            end_offset: p.end_offset,
            duration: p.duration,
            status: p.status.clone(),
            error: p.error.clone(),
            event_data: serde_json::to_string(p)?,
        })
    }
}

/// Row for the `stream_health_metrics` table. Buffer events write here in
/// addition to `stream_events`; the heartbeat agent's health summaries read
/// from it.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct StreamHealthMetricRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::uuid")]
    pub tenant_id: Uuid,
    pub internal_name: String,
    pub node_id: String,
    pub buffer_state: Option<String>,
    pub buffer_health: Option<f64>,
    pub health_score: Option<f64>,
    pub track_count: Option<i32>,
    pub fps: Option<f64>,
    pub bitrate: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub codec: Option<String>,
    pub has_issues: Option<bool>,
    pub issues_desc: Option<String>,
}

impl StreamHealthMetricRow {
    pub fn from_buffer(meta: &EventMeta, p: &StreamStatePayload) -> Self {
        Self {
            event_id: meta.event_id,
            timestamp: meta.timestamp,
            tenant_id: p.tenant_id.to_uuid(),
            internal_name: p.internal_name.clone(),
            node_id: p.node_id.clone(),
            buffer_state: p.buffer_state.clone(),
            buffer_health: p.buffer_seconds,
            health_score: p.health_score,
            track_count: p.track_count,
            fps: p.primary_fps,
            bitrate: p.primary_bitrate,
            width: p.primary_width,
            height: p.primary_height,
            codec: p.primary_codec.clone(),
            has_issues: p.has_issues,
            issues_desc: p.issues_desc.clone(),
        }
    }
}

/// Row for the `agent_usage` table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct UsageRow {
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub recorded_at: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::uuid")]
    pub tenant_id: Uuid,
    pub component: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl From<UsageRecord> for UsageRow {
    fn from(record: UsageRecord) -> Self {
        Self {
            recorded_at: record.recorded_at,
            tenant_id: record.tenant_id.to_uuid(),
            component: record.component,
            prompt_tokens: record.prompt_tokens,
            completion_tokens: record.completion_tokens,
        }
    }
}
