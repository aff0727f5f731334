//! Cluster, node, and alert types used by the infrastructure monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TenantId;

/// A cluster as seen by the monitor sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub cluster_name: String,
    pub is_active: bool,
    pub owner_tenant: Option<TenantId>,
}

/// Latest resource sample for one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: String,
    pub cluster_id: String,
    pub cpu_percent: f64,
    pub ram_used: i64,
    pub ram_total: i64,
    pub disk_used: i64,
    pub disk_total: i64,
    pub updated_at: DateTime<Utc>,
}

/// One 5-minute rollup record from the OLAP store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePerfRecord {
    pub bucket: DateTime<Utc>,
    pub cpu_avg: f64,
    pub mem_avg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfraAlertKind {
    CpuStuck,
    MemoryExhaustion,
    DiskWarning,
    DiskCritical,
}

impl InfraAlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CpuStuck => "cpu_stuck",
            Self::MemoryExhaustion => "memory_exhaustion",
            Self::DiskWarning => "disk_warning",
            Self::DiskCritical => "disk_critical",
        }
    }

    /// Short human label used in alert subjects.
    pub fn issue_label(&self) -> &'static str {
        match self {
            Self::CpuStuck => "CPU stuck",
            Self::MemoryExhaustion => "memory exhaustion",
            Self::DiskWarning => "disk warning",
            Self::DiskCritical => "disk critical",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            Self::CpuStuck | Self::MemoryExhaustion | Self::DiskCritical => {
                AlertSeverity::Critical
            }
            Self::DiskWarning => AlertSeverity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// A confirmed resource alert for one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraAlert {
    pub node_id: String,
    pub cluster_id: String,
    pub cluster_name: String,
    pub alert_type: InfraAlertKind,
    /// Current observed value, percent.
    pub current: f64,
    /// The threshold that was crossed, percent.
    pub threshold: f64,
    /// Baseline mean for this metric, percent; zero when unknown.
    pub baseline: f64,
    pub detected_at: DateTime<Utc>,
}

impl InfraAlert {
    pub fn severity(&self) -> AlertSeverity {
        self.alert_type.severity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationDirection {
    Above,
    Below,
}

/// An observation that strayed from the key's running baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineDeviation {
    pub metric: String,
    pub current: f64,
    pub baseline: f64,
    pub sigma: f64,
    pub direction: DeviationDirection,
}
