//! Postgres backend for the OLTP side: per-stream aggregates and
//! investigation reports.

mod aggregates;
mod reports;

pub use aggregates::PostgresAggregateStore;
pub use reports::PostgresReportStore;

use sqlx::PgPool;
use tracing::info;

use crate::error::Result;

/// Idempotent DDL, safe to run on every startup.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stream_analytics (
        tenant_id UUID NOT NULL,
        internal_name TEXT NOT NULL,
        status TEXT,
        mist_status TEXT,
        session_start_time TIMESTAMPTZ,
        session_end_time TIMESTAMPTZ,
        current_viewers BIGINT NOT NULL DEFAULT 0,
        peak_viewers BIGINT NOT NULL DEFAULT 0,
        total_connections BIGINT NOT NULL DEFAULT 0,
        total_session_duration BIGINT NOT NULL DEFAULT 0,
        upbytes BIGINT NOT NULL DEFAULT 0,
        downbytes BIGINT NOT NULL DEFAULT 0,
        bandwidth_in BIGINT NOT NULL DEFAULT 0,
        bandwidth_out BIGINT NOT NULL DEFAULT 0,
        track_count INTEGER,
        bitrate_kbps INTEGER,
        node_id TEXT,
        last_updated TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (tenant_id, internal_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS skipper_reports (
        id BIGSERIAL PRIMARY KEY,
        tenant_id UUID NOT NULL,
        "trigger" TEXT NOT NULL,
        summary TEXT NOT NULL,
        metrics_reviewed JSONB NOT NULL DEFAULT '[]'::jsonb,
        root_cause TEXT NOT NULL,
        recommendations JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        read_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS skipper_reports_tenant_created_idx
        ON skipper_reports (tenant_id, created_at DESC)
    "#,
];

/// Ensures the OLTP schema exists.
pub async fn initialize_schema(pool: &PgPool) -> Result<()> {
    for statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("OLTP schema ready");
    Ok(())
}
