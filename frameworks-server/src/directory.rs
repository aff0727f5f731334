//! Read-only Postgres adapters for the directory ports.
//!
//! Tenants, billing subscriptions, streams, clusters, and nodes are owned
//! by other control-plane services; the agents only read them. Cursors are
//! stable offsets over a deterministic ordering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use frameworks_core::database::ports::{
    BillingDirectory, ClusterDirectory, StreamDirectory, StreamSummary, TenantRegistry,
    TenantSummary,
};
use frameworks_core::error::{CoreError, Result};
use frameworks_model::{ClusterSummary, NodeSnapshot, Page, TenantId};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn offset_from(cursor: Option<String>) -> i64 {
    cursor.and_then(|c| c.parse().ok()).unwrap_or(0)
}

fn page_of<T>(mut items: Vec<T>, offset: i64, first: u32) -> Page<T> {
    // One extra row is fetched to learn whether another page exists.
    let has_next_page = items.len() > first as usize;
    items.truncate(first as usize);
    let end_cursor = has_next_page.then(|| (offset + first as i64).to_string());
    Page {
        items,
        end_cursor,
        has_next_page,
    }
}

#[async_trait]
impl TenantRegistry for PostgresDirectory {
    async fn list_active_tenants(&self) -> Result<Vec<TenantSummary>> {
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM tenants WHERE is_active = true ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| CoreError::UpstreamUnavailable(format!("tenant registry: {e}")))?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| TenantSummary {
                id: TenantId(id),
                name,
            })
            .collect())
    }
}

#[async_trait]
impl BillingDirectory for PostgresDirectory {
    async fn tier_level(&self, tenant_id: TenantId) -> Result<i32> {
        let tier: Option<i32> = sqlx::query_scalar(
            "SELECT tier_level FROM billing_subscriptions WHERE tenant_id = $1",
        )
        .bind(tenant_id.to_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::UpstreamTransient(format!("billing tier: {e}")))?;
        Ok(tier.unwrap_or(0))
    }

    async fn billing_email(&self, tenant_id: TenantId) -> Result<Option<String>> {
        let email: Option<Option<String>> = sqlx::query_scalar(
            "SELECT billing_email FROM billing_subscriptions WHERE tenant_id = $1",
        )
        .bind(tenant_id.to_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::UpstreamTransient(format!("billing email: {e}")))?;
        Ok(email.flatten().filter(|e| !e.is_empty()))
    }
}

#[async_trait]
impl StreamDirectory for PostgresDirectory {
    async fn list_streams(
        &self,
        tenant_id: TenantId,
        after: Option<String>,
        first: u32,
    ) -> Result<Page<StreamSummary>> {
        let offset = offset_from(after);
        let rows: Vec<(String, bool)> = sqlx::query_as(
            r#"
            SELECT internal_name, is_live
            FROM streams
            WHERE tenant_id = $1
            ORDER BY internal_name
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id.to_uuid())
        .bind(first as i64 + 1)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::UpstreamTransient(format!("stream directory: {e}")))?;

        let items = rows
            .into_iter()
            .map(|(internal_name, is_live)| StreamSummary {
                internal_name,
                is_live,
            })
            .collect();
        Ok(page_of(items, offset, first))
    }
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    node_id: String,
    cluster_id: String,
    cpu_percent: f64,
    ram_used: i64,
    ram_total: i64,
    disk_used: i64,
    disk_total: i64,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl ClusterDirectory for PostgresDirectory {
    async fn list_clusters(
        &self,
        after: Option<String>,
        first: u32,
    ) -> Result<Page<ClusterSummary>> {
        let offset = offset_from(after);
        let rows: Vec<(String, String, bool, Option<Uuid>)> = sqlx::query_as(
            r#"
            SELECT cluster_id, cluster_name, is_active, owner_tenant
            FROM clusters
            ORDER BY cluster_id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(first as i64 + 1)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::UpstreamTransient(format!("cluster directory: {e}")))?;

        let items = rows
            .into_iter()
            .map(|(cluster_id, cluster_name, is_active, owner)| ClusterSummary {
                cluster_id,
                cluster_name,
                is_active,
                owner_tenant: owner.map(TenantId),
            })
            .collect();
        Ok(page_of(items, offset, first))
    }

    async fn list_nodes(&self, cluster_id: &str) -> Result<Vec<NodeSnapshot>> {
        let rows = sqlx::query_as::<_, NodeRow>(
            r#"
            SELECT node_id, cluster_id, cpu_percent, ram_used, ram_total,
                   disk_used, disk_total, updated_at
            FROM nodes
            WHERE cluster_id = $1 AND is_live = true
            ORDER BY node_id
            "#,
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::UpstreamTransient(format!("node listing: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| NodeSnapshot {
                node_id: r.node_id,
                cluster_id: r.cluster_id,
                cpu_percent: r.cpu_percent,
                ram_used: r.ram_used,
                ram_total: r.ram_total,
                disk_used: r.disk_used,
                disk_total: r.disk_total,
                updated_at: r.updated_at,
            })
            .collect())
    }

    async fn node_owner(&self, node_id: &str) -> Result<Option<TenantId>> {
        let owner: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT owner_tenant FROM nodes WHERE node_id = $1")
                .bind(node_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CoreError::UpstreamTransient(format!("node owner: {e}")))?;
        Ok(owner.flatten().map(TenantId))
    }
}
