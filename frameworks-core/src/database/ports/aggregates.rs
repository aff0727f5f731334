use async_trait::async_trait;
use frameworks_model::event::{EventMeta, StreamStatePayload, UserConnectionPayload};
use frameworks_model::{StreamAggregate, TenantId};

use crate::error::Result;

/// The OLTP side of the ingest pipeline: idempotent, conflict-resolving
/// upserts keyed by `(tenant_id, internal_name)`.
///
/// Implementations express each reduction as a single upsert statement so
/// concurrent writers converge under row-level locking. The semantics are
/// defined once in [`crate::reduce`] and mirrored here.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    async fn reduce_stream_lifecycle(
        &self,
        meta: &EventMeta,
        payload: &StreamStatePayload,
    ) -> Result<()>;

    async fn reduce_user_connection(
        &self,
        meta: &EventMeta,
        payload: &UserConnectionPayload,
    ) -> Result<()>;

    async fn reduce_stream_end(
        &self,
        meta: &EventMeta,
        payload: &StreamStatePayload,
    ) -> Result<()>;

    async fn fetch(
        &self,
        tenant_id: TenantId,
        internal_name: &str,
    ) -> Result<Option<StreamAggregate>>;
}
