//! Postgres repository for investigation reports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use frameworks_model::{Recommendation, Report, ReportDraft, ReportTrigger, TenantId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::{MarkRead, ReportStore};
use crate::error::{CoreError, Result};

#[derive(Clone, Debug)]
pub struct PostgresReportStore {
    pool: PgPool,
}

impl PostgresReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: i64,
    tenant_id: Uuid,
    trigger: String,
    summary: String,
    metrics_reviewed: serde_json::Value,
    root_cause: String,
    recommendations: serde_json::Value,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReportRow> for Report {
    type Error = CoreError;

    fn try_from(row: ReportRow) -> Result<Self> {
        let metrics_reviewed: Vec<String> = serde_json::from_value(row.metrics_reviewed)?;
        let recommendations: Vec<Recommendation> = serde_json::from_value(row.recommendations)?;
        let trigger = ReportTrigger::parse(&row.trigger).ok_or_else(|| {
            CoreError::Internal(format!("unknown report trigger {:?}", row.trigger))
        })?;
        Ok(Report {
            id: row.id,
            tenant_id: TenantId(row.tenant_id),
            trigger,
            summary: row.summary,
            metrics_reviewed,
            root_cause: row.root_cause,
            recommendations,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

#[async_trait]
impl ReportStore for PostgresReportStore {
    async fn save(&self, draft: ReportDraft) -> Result<Report> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            INSERT INTO skipper_reports
                (tenant_id, "trigger", summary, metrics_reviewed, root_cause, recommendations)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, tenant_id, "trigger", summary, metrics_reviewed,
                      root_cause, recommendations, created_at, read_at
            "#,
        )
        .bind(draft.tenant_id.to_uuid())
        .bind(draft.trigger.as_str())
        .bind(&draft.summary)
        .bind(serde_json::to_value(&draft.metrics_reviewed)?)
        .bind(&draft.root_cause)
        .bind(serde_json::to_value(&draft.recommendations)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::Persistence(e.to_string()))?;
        row.try_into()
    }

    async fn list_by_tenant(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Report>> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, tenant_id, "trigger", summary, metrics_reviewed,
                   root_cause, recommendations, created_at, read_at
            FROM skipper_reports
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id.to_uuid())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Report::try_from).collect()
    }

    async fn list_paginated(
        &self,
        tenant_id: TenantId,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Report>, u64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM skipper_reports WHERE tenant_id = $1",
        )
        .bind(tenant_id.to_uuid())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, tenant_id, "trigger", summary, metrics_reviewed,
                   root_cause, recommendations, created_at, read_at
            FROM skipper_reports
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id.to_uuid())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let reports: Result<Vec<Report>> = rows.into_iter().map(Report::try_from).collect();
        Ok((reports?, total as u64))
    }

    async fn get(&self, tenant_id: TenantId, id: i64) -> Result<Option<Report>> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, tenant_id, "trigger", summary, metrics_reviewed,
                   root_cause, recommendations, created_at, read_at
            FROM skipper_reports
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.to_uuid())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Report::try_from).transpose()
    }

    async fn mark_read(&self, tenant_id: TenantId, selection: MarkRead) -> Result<u64> {
        let result = match selection {
            MarkRead::All => {
                sqlx::query(
                    r#"
                    UPDATE skipper_reports SET read_at = now()
                    WHERE tenant_id = $1 AND read_at IS NULL
                    "#,
                )
                .bind(tenant_id.to_uuid())
                .execute(&self.pool)
                .await?
            }
            MarkRead::Ids(ids) => {
                sqlx::query(
                    r#"
                    UPDATE skipper_reports SET read_at = now()
                    WHERE tenant_id = $1 AND id = ANY($2) AND read_at IS NULL
                    "#,
                )
                .bind(tenant_id.to_uuid())
                .bind(&ids)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn unread_count(&self, tenant_id: TenantId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM skipper_reports WHERE tenant_id = $1 AND read_at IS NULL",
        )
        .bind(tenant_id.to_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }
}
