//! Telemetry event model.
//!
//! Incoming telemetry is a tagged union over a closed set of variants. The
//! wire shape is an [`EventEnvelope`] (common fields plus an untyped `data`
//! payload); validation turns an envelope into a [`TelemetryEvent`] whose
//! payload is one of the typed variants below. Events are created by
//! external producers and never mutated once ingested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ids::TenantId;

/// Raw wire envelope, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub internal_name: Option<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub data: Value,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

/// Envelope fields shared by every validated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMeta {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub schema_version: String,
}

/// A validated telemetry event: envelope metadata plus a typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub meta: EventMeta,
    pub payload: EventPayload,
}

impl TelemetryEvent {
    /// Tenant scope of the event, when the variant carries one.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.payload.tenant_id()
    }

    /// The wire tag for this payload variant.
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Closed set of telemetry variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    StreamIngest(StreamIngestPayload),
    StreamLifecycle(StreamStatePayload),
    StreamBuffer(StreamStatePayload),
    StreamEnd(StreamStatePayload),
    StreamView(StreamViewPayload),
    UserConnection(UserConnectionPayload),
    ClientLifecycle(ClientLifecyclePayload),
    TrackList(TrackListPayload),
    BandwidthThreshold(BandwidthThresholdPayload),
    RecordingLifecycle(RecordingLifecyclePayload),
    PushLifecycle(PushLifecyclePayload),
    NodeLifecycle(NodeLifecyclePayload),
    LoadBalancing(LoadBalancingPayload),
    ClipLifecycle(ClipLifecyclePayload),
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StreamIngest(_) => "stream-ingest",
            Self::StreamLifecycle(_) => "stream-lifecycle",
            Self::StreamBuffer(_) => "stream-buffer",
            Self::StreamEnd(_) => "stream-end",
            Self::StreamView(_) => "stream-view",
            Self::UserConnection(_) => "user-connection",
            Self::ClientLifecycle(_) => "client-lifecycle",
            Self::TrackList(_) => "track-list",
            Self::BandwidthThreshold(_) => "bandwidth-threshold",
            Self::RecordingLifecycle(_) => "recording-lifecycle",
            Self::PushLifecycle(_) => "push-lifecycle",
            Self::NodeLifecycle(_) => "node-lifecycle",
            Self::LoadBalancing(_) => "load-balancing",
            Self::ClipLifecycle(_) => "clip-lifecycle",
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            Self::StreamIngest(p) => Some(p.tenant_id),
            Self::StreamLifecycle(p) | Self::StreamBuffer(p) | Self::StreamEnd(p) => {
                Some(p.tenant_id)
            }
            Self::StreamView(p) => Some(p.tenant_id),
            Self::UserConnection(p) => Some(p.tenant_id),
            Self::ClientLifecycle(p) => Some(p.tenant_id),
            Self::TrackList(p) => Some(p.tenant_id),
            Self::BandwidthThreshold(p) => Some(p.tenant_id),
            Self::RecordingLifecycle(p) => Some(p.tenant_id),
            Self::PushLifecycle(p) => Some(p.tenant_id),
            Self::NodeLifecycle(p) => p.tenant_id,
            Self::LoadBalancing(p) => p.tenant_id,
            Self::ClipLifecycle(p) => Some(p.tenant_id),
        }
    }

    /// Stream identifier, for the variants that are stream-scoped.
    pub fn internal_name(&self) -> Option<&str> {
        match self {
            Self::StreamIngest(p) => Some(&p.internal_name),
            Self::StreamLifecycle(p) | Self::StreamBuffer(p) | Self::StreamEnd(p) => {
                Some(&p.internal_name)
            }
            Self::StreamView(p) => Some(&p.internal_name),
            Self::UserConnection(p) => Some(&p.internal_name),
            Self::ClientLifecycle(p) => p.internal_name.as_deref(),
            Self::TrackList(p) => Some(&p.internal_name),
            Self::BandwidthThreshold(p) => p.internal_name.as_deref(),
            Self::RecordingLifecycle(p) => Some(&p.internal_name),
            Self::PushLifecycle(p) => Some(&p.internal_name),
            Self::NodeLifecycle(_) => None,
            Self::LoadBalancing(p) => p.internal_name.as_deref(),
            Self::ClipLifecycle(p) => Some(&p.internal_name),
        }
    }
}

/// A new ingest session was opened on a media node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamIngestPayload {
    pub tenant_id: TenantId,
    pub internal_name: String,
    pub node_id: String,
    pub stream_key: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub push_url: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Shared payload for `stream-lifecycle`, `stream-buffer`, and `stream-end`.
///
/// The three tags carry the same field set; which subset is meaningful
/// depends on the tag (buffer state for buffer events, totals for end
/// events).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamStatePayload {
    pub tenant_id: TenantId,
    pub internal_name: String,
    pub node_id: String,
    pub status: String,
    #[serde(default)]
    pub buffer_state: Option<String>,
    /// Seconds of media currently buffered ahead of the play head.
    #[serde(default)]
    pub buffer_seconds: Option<f64>,
    #[serde(default)]
    pub downloaded_bytes: Option<i64>,
    #[serde(default)]
    pub uploaded_bytes: Option<i64>,
    #[serde(default)]
    pub total_viewers: Option<i64>,
    #[serde(default)]
    pub total_connections: Option<i64>,
    #[serde(default)]
    pub total_inputs: Option<i64>,
    #[serde(default)]
    pub total_outputs: Option<i64>,
    #[serde(default)]
    pub viewer_seconds: Option<i64>,
    #[serde(default)]
    pub health_score: Option<f64>,
    #[serde(default)]
    pub has_issues: Option<bool>,
    #[serde(default)]
    pub issues_desc: Option<String>,
    #[serde(default)]
    pub track_count: Option<i32>,
    #[serde(default)]
    pub quality_tier: Option<String>,
    #[serde(default)]
    pub primary_width: Option<i32>,
    #[serde(default)]
    pub primary_height: Option<i32>,
    #[serde(default)]
    pub primary_fps: Option<f64>,
    #[serde(default)]
    pub primary_codec: Option<String>,
    #[serde(default)]
    pub primary_bitrate: Option<i64>,
}

/// A viewer landed on a stream page (minimal row, no session tracking).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamViewPayload {
    pub tenant_id: TenantId,
    pub internal_name: String,
    #[serde(default)]
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionAction {
    Connect,
    Disconnect,
}

/// A viewer connection opened or closed on a media node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConnectionPayload {
    pub tenant_id: TenantId,
    pub internal_name: String,
    pub session_id: String,
    pub action: ConnectionAction,
    #[serde(default)]
    pub seconds_connected: Option<i64>,
    #[serde(default)]
    pub downloaded_bytes: Option<i64>,
    #[serde(default)]
    pub uploaded_bytes: Option<i64>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Player-side quality-of-experience sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientLifecyclePayload {
    pub tenant_id: TenantId,
    pub session_id: String,
    pub event: String,
    #[serde(default)]
    pub internal_name: Option<String>,
    #[serde(default)]
    pub buffer_health: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub bitrate: Option<i64>,
    #[serde(default)]
    pub packet_loss: Option<f64>,
    #[serde(default)]
    pub bandwidth: Option<i64>,
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Full track inventory for a stream, as reported by the media node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackListPayload {
    pub tenant_id: TenantId,
    pub internal_name: String,
    pub track_list: Value,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub track_count: Option<i32>,
    /// Previous inventory, when the producer saw the transition. A change
    /// against `track_list` emits an additional track-change row.
    #[serde(default)]
    pub previous_track_list: Option<Value>,
}

/// A stream crossed its configured bandwidth limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthThresholdPayload {
    pub tenant_id: TenantId,
    pub node_id: String,
    #[serde(default)]
    pub internal_name: Option<String>,
    #[serde(default)]
    pub current_rate: Option<i64>,
    #[serde(default)]
    pub threshold: Option<i64>,
    #[serde(default)]
    pub exceeded: Option<bool>,
}

/// Recording started, stopped, or failed for a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingLifecyclePayload {
    pub tenant_id: TenantId,
    pub internal_name: String,
    pub action: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub recording_id: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    Start,
    End,
}

/// Outbound push (restream) lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushLifecyclePayload {
    pub tenant_id: TenantId,
    pub internal_name: String,
    pub action: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub push_id: Option<String>,
    #[serde(default)]
    pub target_uri: Option<String>,
    #[serde(default)]
    pub bytes_sent: Option<i64>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PushLifecyclePayload {
    /// Actions other than `start` take the end-shape column set.
    pub fn action(&self) -> PushAction {
        if self.action == "start" {
            PushAction::Start
        } else {
            PushAction::End
        }
    }
}

/// Resource sample from a media node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLifecyclePayload {
    pub node_id: String,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub ram_used: Option<i64>,
    #[serde(default)]
    pub ram_total: Option<i64>,
    #[serde(default)]
    pub disk_used: Option<i64>,
    #[serde(default)]
    pub disk_total: Option<i64>,
    #[serde(default)]
    pub bandwidth_in: Option<i64>,
    #[serde(default)]
    pub bandwidth_out: Option<i64>,
    #[serde(default)]
    pub stream_count: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A routing decision made by the load balancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancingPayload {
    pub selected_node: String,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub internal_name: Option<String>,
    #[serde(default)]
    pub candidates: Option<Value>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Clip creation lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipLifecyclePayload {
    pub tenant_id: TenantId,
    pub internal_name: String,
    pub clip_id: String,
    pub action: String,
    #[serde(default)]
    pub start_offset: Option<f64>,
    #[serde(default)]
    pub end_offset: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
