//! The reducer's Postgres side.
//!
//! Every reduction is a single `INSERT … ON CONFLICT … DO UPDATE` keyed by
//! `(tenant_id, internal_name)`, so concurrent writers converge under
//! row-level locking and replays stay safe. The semantics mirror
//! [`crate::reduce`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use frameworks_model::event::{
    ConnectionAction, EventMeta, StreamStatePayload, UserConnectionPayload,
};
use frameworks_model::{MistStatus, StreamAggregate, TenantId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::AggregateStore;
use crate::error::Result;
use crate::reduce::is_session_start_status;

#[derive(Clone, Debug)]
pub struct PostgresAggregateStore {
    pool: PgPool,
}

impl PostgresAggregateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AggregateRow {
    tenant_id: Uuid,
    internal_name: String,
    status: Option<String>,
    mist_status: Option<String>,
    session_start_time: Option<DateTime<Utc>>,
    session_end_time: Option<DateTime<Utc>>,
    current_viewers: i64,
    peak_viewers: i64,
    total_connections: i64,
    total_session_duration: i64,
    upbytes: i64,
    downbytes: i64,
    bandwidth_in: i64,
    bandwidth_out: i64,
    track_count: Option<i32>,
    bitrate_kbps: Option<i32>,
    node_id: Option<String>,
    last_updated: DateTime<Utc>,
}

impl From<AggregateRow> for StreamAggregate {
    fn from(row: AggregateRow) -> Self {
        StreamAggregate {
            tenant_id: TenantId(row.tenant_id),
            internal_name: row.internal_name,
            status: row.status,
            mist_status: row.mist_status.as_deref().and_then(MistStatus::parse),
            session_start_time: row.session_start_time,
            session_end_time: row.session_end_time,
            current_viewers: row.current_viewers,
            peak_viewers: row.peak_viewers,
            total_connections: row.total_connections,
            total_session_duration: row.total_session_duration,
            upbytes: row.upbytes,
            downbytes: row.downbytes,
            bandwidth_in: row.bandwidth_in,
            bandwidth_out: row.bandwidth_out,
            track_count: row.track_count,
            bitrate_kbps: row.bitrate_kbps,
            node_id: row.node_id,
            last_updated: row.last_updated,
        }
    }
}

#[async_trait]
impl AggregateStore for PostgresAggregateStore {
    async fn reduce_stream_lifecycle(
        &self,
        meta: &EventMeta,
        payload: &StreamStatePayload,
    ) -> Result<()> {
        let mist_status = MistStatus::parse(&payload.status).map(|m| m.as_str());
        let is_start = is_session_start_status(&payload.status);
        let bitrate_kbps = payload.primary_bitrate.map(|b| (b / 1000) as i32);

        sqlx::query(
            r#"
            INSERT INTO stream_analytics (
                tenant_id, internal_name, status, mist_status, session_start_time,
                peak_viewers, total_connections, track_count, bitrate_kbps, node_id, last_updated
            ) VALUES (
                $1, $2, $3, $4, CASE WHEN $5 THEN $6 ELSE NULL END,
                COALESCE($7, 0), COALESCE($8, 0), $9, $10, $11, $6
            )
            ON CONFLICT (tenant_id, internal_name) DO UPDATE SET
                status = EXCLUDED.status,
                mist_status = COALESCE(EXCLUDED.mist_status, stream_analytics.mist_status),
                session_start_time = CASE
                    WHEN stream_analytics.session_start_time IS NULL AND $5 THEN $6
                    ELSE stream_analytics.session_start_time
                END,
                peak_viewers = GREATEST(
                    stream_analytics.peak_viewers,
                    COALESCE($7, stream_analytics.peak_viewers)
                ),
                total_connections = GREATEST(
                    stream_analytics.total_connections,
                    COALESCE($8, stream_analytics.total_connections)
                ),
                track_count = COALESCE(EXCLUDED.track_count, stream_analytics.track_count),
                bitrate_kbps = COALESCE(EXCLUDED.bitrate_kbps, stream_analytics.bitrate_kbps),
                node_id = EXCLUDED.node_id,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(payload.tenant_id.to_uuid())
        .bind(&payload.internal_name)
        .bind(&payload.status)
        .bind(mist_status)
        .bind(is_start)
        .bind(meta.timestamp)
        .bind(payload.total_viewers)
        .bind(payload.total_connections)
        .bind(payload.track_count)
        .bind(bitrate_kbps)
        .bind(&payload.node_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reduce_user_connection(
        &self,
        meta: &EventMeta,
        payload: &UserConnectionPayload,
    ) -> Result<()> {
        match payload.action {
            ConnectionAction::Connect => {
                sqlx::query(
                    r#"
                    INSERT INTO stream_analytics (
                        tenant_id, internal_name, current_viewers, peak_viewers,
                        total_connections, last_updated
                    ) VALUES ($1, $2, 1, 1, 1, $3)
                    ON CONFLICT (tenant_id, internal_name) DO UPDATE SET
                        current_viewers = stream_analytics.current_viewers + 1,
                        peak_viewers = GREATEST(
                            stream_analytics.peak_viewers,
                            stream_analytics.current_viewers + 1
                        ),
                        total_connections = stream_analytics.total_connections + 1,
                        last_updated = EXCLUDED.last_updated
                    "#,
                )
                .bind(payload.tenant_id.to_uuid())
                .bind(&payload.internal_name)
                .bind(meta.timestamp)
                .execute(&self.pool)
                .await?;
            }
            ConnectionAction::Disconnect => {
                sqlx::query(
                    r#"
                    INSERT INTO stream_analytics (
                        tenant_id, internal_name, current_viewers, total_session_duration,
                        upbytes, downbytes, bandwidth_in, bandwidth_out, last_updated
                    ) VALUES ($1, $2, 0, $3, $4, $5, $4, $5, $6)
                    ON CONFLICT (tenant_id, internal_name) DO UPDATE SET
                        current_viewers = GREATEST(0, stream_analytics.current_viewers - 1),
                        total_session_duration = stream_analytics.total_session_duration + $3,
                        upbytes = stream_analytics.upbytes + $4,
                        downbytes = stream_analytics.downbytes + $5,
                        bandwidth_in = stream_analytics.bandwidth_in + $4,
                        bandwidth_out = stream_analytics.bandwidth_out + $5,
                        last_updated = EXCLUDED.last_updated
                    "#,
                )
                .bind(payload.tenant_id.to_uuid())
                .bind(&payload.internal_name)
                .bind(payload.seconds_connected.unwrap_or(0))
                .bind(payload.uploaded_bytes.unwrap_or(0))
                .bind(payload.downloaded_bytes.unwrap_or(0))
                .bind(meta.timestamp)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn reduce_stream_end(
        &self,
        meta: &EventMeta,
        payload: &StreamStatePayload,
    ) -> Result<()> {
        let mist_status = MistStatus::parse(&payload.status).map(|m| m.as_str());
        sqlx::query(
            r#"
            INSERT INTO stream_analytics (
                tenant_id, internal_name, status, mist_status, session_end_time, last_updated
            ) VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (tenant_id, internal_name) DO UPDATE SET
                status = EXCLUDED.status,
                mist_status = COALESCE(EXCLUDED.mist_status, stream_analytics.mist_status),
                session_end_time = EXCLUDED.session_end_time,
                session_start_time = NULL,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(payload.tenant_id.to_uuid())
        .bind(&payload.internal_name)
        .bind(&payload.status)
        .bind(mist_status)
        .bind(meta.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(
        &self,
        tenant_id: TenantId,
        internal_name: &str,
    ) -> Result<Option<StreamAggregate>> {
        let row = sqlx::query_as::<_, AggregateRow>(
            r#"
            SELECT tenant_id, internal_name, status, mist_status, session_start_time,
                   session_end_time, current_viewers, peak_viewers, total_connections,
                   total_session_duration, upbytes, downbytes, bandwidth_in, bandwidth_out,
                   track_count, bitrate_kbps, node_id, last_updated
            FROM stream_analytics
            WHERE tenant_id = $1 AND internal_name = $2
            "#,
        )
        .bind(tenant_id.to_uuid())
        .bind(internal_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StreamAggregate::from))
    }
}
