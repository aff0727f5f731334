//! Reduced per-stream analytics state (the OLTP side of the pipeline).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TenantId;

/// The finite media-node status enum.
///
/// Raw lifecycle statuses outside this set are preserved in
/// [`StreamAggregate::status`] but never written to `mist_status`. Matching
/// is a case-sensitive literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MistStatus {
    Offline,
    Init,
    Boot,
    Wait,
    Ready,
    Shutdown,
    Invalid,
}

impl MistStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "offline" => Some(Self::Offline),
            "init" => Some(Self::Init),
            "boot" => Some(Self::Boot),
            "wait" => Some(Self::Wait),
            "ready" => Some(Self::Ready),
            "shutdown" => Some(Self::Shutdown),
            "invalid" => Some(Self::Invalid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Init => "init",
            Self::Boot => "boot",
            Self::Wait => "wait",
            Self::Ready => "ready",
            Self::Shutdown => "shutdown",
            Self::Invalid => "invalid",
        }
    }
}

/// Per-stream aggregate, keyed by `(tenant_id, internal_name)`.
///
/// Upserted by the reducer, never hard-deleted. Invariants:
/// `current_viewers >= 0`, `peak_viewers >= current_viewers`, and
/// `session_start_time` is set at most once per session and cleared only on
/// the terminal transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamAggregate {
    pub tenant_id: TenantId,
    pub internal_name: String,
    pub status: Option<String>,
    pub mist_status: Option<MistStatus>,
    pub session_start_time: Option<DateTime<Utc>>,
    pub session_end_time: Option<DateTime<Utc>>,
    pub current_viewers: i64,
    pub peak_viewers: i64,
    pub total_connections: i64,
    /// Accumulated viewer session time, in seconds.
    pub total_session_duration: i64,
    pub upbytes: i64,
    pub downbytes: i64,
    pub bandwidth_in: i64,
    pub bandwidth_out: i64,
    pub track_count: Option<i32>,
    pub bitrate_kbps: Option<i32>,
    pub node_id: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl StreamAggregate {
    /// Fresh aggregate for a stream that has produced its first event.
    pub fn new(tenant_id: TenantId, internal_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            internal_name: internal_name.into(),
            status: None,
            mist_status: None,
            session_start_time: None,
            session_end_time: None,
            current_viewers: 0,
            peak_viewers: 0,
            total_connections: 0,
            total_session_duration: 0,
            upbytes: 0,
            downbytes: 0,
            bandwidth_in: 0,
            bandwidth_out: 0,
            track_count: None,
            bitrate_kbps: None,
            node_id: None,
            last_updated: now,
        }
    }
}
