//! Per-cycle tenant health snapshot and threshold violations.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::ids::TenantId;

/// Aggregated stream-health metrics over the snapshot window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub avg_buffer_health: f64,
    pub avg_fps: f64,
    pub avg_bitrate: f64,
    pub total_issue_count: i64,
    pub sample_count: i64,
}

/// Aggregated client quality-of-experience metrics over the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientQoeSummary {
    pub avg_packet_loss: f64,
    pub avg_bandwidth: f64,
    pub session_count: i64,
}

/// Ephemeral per-tenant view built once per agent cycle. Not persisted.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub tenant_id: TenantId,
    pub active_streams: u64,
    pub window: Duration,
    pub health: Option<HealthSummary>,
    pub client_qoe: Option<ClientQoeSummary>,
}

/// The enumerable metrics the threshold trigger evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageMetric {
    AvgBufferHealth,
    AvgFps,
    AvgBitrate,
    TotalIssueCount,
    AvgPacketLoss,
}

impl TriageMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AvgBufferHealth => "avg_buffer_health",
            Self::AvgFps => "avg_fps",
            Self::AvgBitrate => "avg_bitrate",
            Self::TotalIssueCount => "total_issue_count",
            Self::AvgPacketLoss => "avg_packet_loss",
        }
    }
}

/// One hard-threshold breach found in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdViolation {
    pub metric: TriageMetric,
    pub value: f64,
    pub limit: f64,
    pub message: String,
}
