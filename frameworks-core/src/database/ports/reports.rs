use async_trait::async_trait;
use frameworks_model::{Report, ReportDraft, TenantId};

use crate::error::Result;

/// Which reports a read-marking call targets.
#[derive(Debug, Clone)]
pub enum MarkRead {
    Ids(Vec<i64>),
    All,
}

/// Persistence for investigation reports.
///
/// Every read is tenant-scoped; mutations are append-only except the
/// `read_at` transition, which is monotonic (once set it remains set).
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persists the draft, assigning `id` and `created_at`.
    async fn save(&self, draft: ReportDraft) -> Result<Report>;

    async fn list_by_tenant(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Report>>;

    /// Newest-first page plus the tenant's total report count.
    async fn list_paginated(
        &self,
        tenant_id: TenantId,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Report>, u64)>;

    async fn get(&self, tenant_id: TenantId, id: i64) -> Result<Option<Report>>;

    /// Returns how many reports transitioned to read.
    async fn mark_read(&self, tenant_id: TenantId, selection: MarkRead) -> Result<u64>;

    async fn unread_count(&self, tenant_id: TenantId) -> Result<u64>;
}
