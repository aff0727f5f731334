//! Investigation reports produced by the triage agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TenantId;

/// What set off the investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTrigger {
    Heartbeat,
    Threshold,
    Lookout,
    Manual,
    Flag,
}

impl ReportTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Threshold => "threshold",
            Self::Lookout => "lookout",
            Self::Manual => "manual",
            Self::Flag => "flag",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "heartbeat" => Some(Self::Heartbeat),
            "threshold" => Some(Self::Threshold),
            "lookout" => Some(Self::Lookout),
            "manual" => Some(Self::Manual),
            "flag" => Some(Self::Flag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    #[serde(default)]
    pub confidence: Confidence,
}

/// A report as assembled by the agent, before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDraft {
    pub tenant_id: TenantId,
    pub trigger: ReportTrigger,
    pub summary: String,
    pub metrics_reviewed: Vec<String>,
    pub root_cause: String,
    pub recommendations: Vec<Recommendation>,
}

/// A persisted report. `id` and `created_at` are assigned on save; `read_at`
/// transitions once from null and then stays set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub tenant_id: TenantId,
    pub trigger: ReportTrigger,
    pub summary: String,
    pub metrics_reviewed: Vec<String>,
    pub root_cause: String,
    pub recommendations: Vec<Recommendation>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}
