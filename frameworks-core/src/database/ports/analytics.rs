use async_trait::async_trait;
use chrono::Duration;
use frameworks_model::{ClientQoeSummary, HealthSummary, NodePerfRecord, TenantId};

use crate::error::Result;

/// Read side of the OLAP store: windowed summaries for the triage agents.
#[async_trait]
pub trait AnalyticsReader: Send + Sync {
    /// Stream-health summary over the trailing window, or `None` when the
    /// tenant produced no health samples in it.
    async fn health_summary(
        &self,
        tenant_id: TenantId,
        window: Duration,
    ) -> Result<Option<HealthSummary>>;

    /// Client QoE summary over the trailing window.
    async fn qoe_summary(
        &self,
        tenant_id: TenantId,
        window: Duration,
    ) -> Result<Option<ClientQoeSummary>>;

    /// 5-minute resource rollups for one node over the trailing window,
    /// oldest first.
    async fn node_perf_history(
        &self,
        node_id: &str,
        window: Duration,
    ) -> Result<Vec<NodePerfRecord>>;
}
