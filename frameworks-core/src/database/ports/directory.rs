//! Read-only directory ports over the rest of the control plane.
//!
//! Tenants, billing subscriptions, streams, and clusters are owned by other
//! services; the agents only ever read them through these seams.

use async_trait::async_trait;
use frameworks_model::{ClusterSummary, NodeSnapshot, Page, TenantId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: TenantId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSummary {
    pub internal_name: String,
    pub is_live: bool,
}

#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn list_active_tenants(&self) -> Result<Vec<TenantSummary>>;
}

#[async_trait]
pub trait BillingDirectory: Send + Sync {
    /// Numeric tier level of the tenant's subscription.
    async fn tier_level(&self, tenant_id: TenantId) -> Result<i32>;

    /// Billing contact address, when one is on file.
    async fn billing_email(&self, tenant_id: TenantId) -> Result<Option<String>>;
}

#[async_trait]
pub trait StreamDirectory: Send + Sync {
    /// Cursor-paginated stream listing for one tenant.
    async fn list_streams(
        &self,
        tenant_id: TenantId,
        after: Option<String>,
        first: u32,
    ) -> Result<Page<StreamSummary>>;
}

#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    /// Cursor-paginated cluster listing across the fleet.
    async fn list_clusters(
        &self,
        after: Option<String>,
        first: u32,
    ) -> Result<Page<ClusterSummary>>;

    /// Live nodes currently registered to the cluster.
    async fn list_nodes(&self, cluster_id: &str) -> Result<Vec<NodeSnapshot>>;

    /// Per-node owner, when the node is dedicated to one tenant.
    async fn node_owner(&self, node_id: &str) -> Result<Option<TenantId>>;
}
