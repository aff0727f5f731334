//! In-memory backends.
//!
//! Mutex-guarded maps that apply the same reduction semantics as the
//! Postgres statements. Tests and local development wire these in place of
//! the real stores.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use frameworks_model::event::{EventMeta, StreamStatePayload, UserConnectionPayload};
use frameworks_model::{
    ClientQoeSummary, HealthSummary, NodePerfRecord, Report, ReportDraft, StreamAggregate,
    TenantId, UsageRecord,
};

use crate::clock::Clock;
use crate::database::ports::{
    AggregateStore, AnalyticsReader, MarkRead, OlapSink, ReportStore,
};
use crate::error::Result;
use crate::ingest::rows::*;
use crate::reduce;

/// Aggregate store over a plain map; reductions call into [`crate::reduce`].
#[derive(Debug, Default)]
pub struct MemoryAggregateStore {
    aggregates: Mutex<HashMap<(TenantId, String), StreamAggregate>>,
}

impl MemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_aggregate<F>(&self, meta: &EventMeta, tenant_id: TenantId, name: &str, f: F)
    where
        F: FnOnce(&mut StreamAggregate),
    {
        let mut aggregates = self.aggregates.lock().unwrap_or_else(|e| e.into_inner());
        let agg = aggregates
            .entry((tenant_id, name.to_string()))
            .or_insert_with(|| StreamAggregate::new(tenant_id, name, meta.timestamp));
        f(agg);
    }
}

#[async_trait]
impl AggregateStore for MemoryAggregateStore {
    async fn reduce_stream_lifecycle(
        &self,
        meta: &EventMeta,
        payload: &StreamStatePayload,
    ) -> Result<()> {
        self.with_aggregate(meta, payload.tenant_id, &payload.internal_name, |agg| {
            reduce::apply_stream_lifecycle(agg, meta, payload)
        });
        Ok(())
    }

    async fn reduce_user_connection(
        &self,
        meta: &EventMeta,
        payload: &UserConnectionPayload,
    ) -> Result<()> {
        self.with_aggregate(meta, payload.tenant_id, &payload.internal_name, |agg| {
            reduce::apply_user_connection(agg, meta, payload)
        });
        Ok(())
    }

    async fn reduce_stream_end(
        &self,
        meta: &EventMeta,
        payload: &StreamStatePayload,
    ) -> Result<()> {
        self.with_aggregate(meta, payload.tenant_id, &payload.internal_name, |agg| {
            reduce::apply_stream_end(agg, meta, payload)
        });
        Ok(())
    }

    async fn fetch(
        &self,
        tenant_id: TenantId,
        internal_name: &str,
    ) -> Result<Option<StreamAggregate>> {
        let aggregates = self.aggregates.lock().unwrap_or_else(|e| e.into_inner());
        Ok(aggregates
            .get(&(tenant_id, internal_name.to_string()))
            .cloned())
    }
}

/// Report store over a vector, with the same tenant scoping and monotonic
/// `read_at` rules as the Postgres repository.
pub struct MemoryReportStore {
    clock: Arc<dyn Clock>,
    next_id: AtomicI64,
    reports: Mutex<Vec<Report>>,
}

impl std::fmt::Debug for MemoryReportStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryReportStore").finish_non_exhaustive()
    }
}

impl MemoryReportStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_id: AtomicI64::new(1),
            reports: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn save(&self, draft: ReportDraft) -> Result<Report> {
        let report = Report {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            tenant_id: draft.tenant_id,
            trigger: draft.trigger,
            summary: draft.summary,
            metrics_reviewed: draft.metrics_reviewed,
            root_cause: draft.root_cause,
            recommendations: draft.recommendations,
            created_at: self.clock.now(),
            read_at: None,
        };
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report.clone());
        Ok(report)
    }

    async fn list_by_tenant(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Report>> {
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        let mut items: Vec<Report> = reports
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn list_paginated(
        &self,
        tenant_id: TenantId,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Report>, u64)> {
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        let mut items: Vec<Report> = reports
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = items.len() as u64;
        let page = items
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn get(&self, tenant_id: TenantId, id: i64) -> Result<Option<Report>> {
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reports
            .iter()
            .find(|r| r.tenant_id == tenant_id && r.id == id)
            .cloned())
    }

    async fn mark_read(&self, tenant_id: TenantId, selection: MarkRead) -> Result<u64> {
        let now = self.clock.now();
        let mut reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        let mut marked = 0u64;
        for report in reports.iter_mut() {
            if report.tenant_id != tenant_id || report.read_at.is_some() {
                continue;
            }
            let selected = match &selection {
                MarkRead::All => true,
                MarkRead::Ids(ids) => ids.contains(&report.id),
            };
            if selected {
                report.read_at = Some(now);
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn unread_count(&self, tenant_id: TenantId) -> Result<u64> {
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reports
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.read_at.is_none())
            .count() as u64)
    }
}

#[derive(Debug, Default)]
struct OlapState {
    stream_events: Vec<StreamEventRow>,
    connection_events: Vec<ConnectionEventRow>,
    client_metrics: Vec<ClientMetricRow>,
    track_lists: Vec<TrackListRow>,
    track_changes: Vec<TrackChangeRow>,
    node_metrics: Vec<NodeMetricRow>,
    routing_events: Vec<RoutingEventRow>,
    clip_events: Vec<ClipEventRow>,
    health_metrics: Vec<StreamHealthMetricRow>,
    usage: Vec<UsageRecord>,
    health_summaries: HashMap<TenantId, HealthSummary>,
    qoe_summaries: HashMap<TenantId, ClientQoeSummary>,
    node_perf: HashMap<String, Vec<NodePerfRecord>>,
}

/// Capturing OLAP backend: appended rows are kept for inspection, and the
/// analytics read side serves whatever summaries the test staged.
#[derive(Debug, Default)]
pub struct MemoryOlapSink {
    state: Mutex<OlapState>,
}

macro_rules! snapshot_of {
    ($name:ident, $field:ident, $ty:ty) => {
        pub fn $name(&self) -> Vec<$ty> {
            self.state
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .$field
                .clone()
        }
    };
}

impl MemoryOlapSink {
    fn with_state<R>(&self, f: impl FnOnce(&mut OlapState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    snapshot_of!(stream_events, stream_events, StreamEventRow);
    snapshot_of!(connection_events, connection_events, ConnectionEventRow);
    snapshot_of!(client_metrics, client_metrics, ClientMetricRow);
    snapshot_of!(track_lists, track_lists, TrackListRow);
    snapshot_of!(track_changes, track_changes, TrackChangeRow);
    snapshot_of!(node_metrics, node_metrics, NodeMetricRow);
    snapshot_of!(routing_events, routing_events, RoutingEventRow);
    snapshot_of!(clip_events, clip_events, ClipEventRow);
    snapshot_of!(health_metrics, health_metrics, StreamHealthMetricRow);
    snapshot_of!(usage_records, usage, UsageRecord);

    pub fn set_health_summary(&self, tenant_id: TenantId, summary: HealthSummary) {
        self.with_state(|s| s.health_summaries.insert(tenant_id, summary));
    }

    pub fn set_qoe_summary(&self, tenant_id: TenantId, summary: ClientQoeSummary) {
        self.with_state(|s| s.qoe_summaries.insert(tenant_id, summary));
    }

    pub fn set_node_perf(&self, node_id: &str, records: Vec<NodePerfRecord>) {
        self.with_state(|s| s.node_perf.insert(node_id.to_string(), records));
    }
}

#[async_trait]
impl OlapSink for MemoryOlapSink {
    async fn append_stream_events(&self, rows: Vec<StreamEventRow>) -> Result<()> {
        self.with_state(|s| s.stream_events.extend(rows));
        Ok(())
    }
    async fn append_connection_events(&self, rows: Vec<ConnectionEventRow>) -> Result<()> {
        self.with_state(|s| s.connection_events.extend(rows));
        Ok(())
    }
    async fn append_client_metrics(&self, rows: Vec<ClientMetricRow>) -> Result<()> {
        self.with_state(|s| s.client_metrics.extend(rows));
        Ok(())
    }
    async fn append_track_lists(&self, rows: Vec<TrackListRow>) -> Result<()> {
        self.with_state(|s| s.track_lists.extend(rows));
        Ok(())
    }
    async fn append_track_changes(&self, rows: Vec<TrackChangeRow>) -> Result<()> {
        self.with_state(|s| s.track_changes.extend(rows));
        Ok(())
    }
    async fn append_node_metrics(&self, rows: Vec<NodeMetricRow>) -> Result<()> {
        self.with_state(|s| s.node_metrics.extend(rows));
        Ok(())
    }
    async fn append_routing_events(&self, rows: Vec<RoutingEventRow>) -> Result<()> {
        self.with_state(|s| s.routing_events.extend(rows));
        Ok(())
    }
    async fn append_clip_events(&self, rows: Vec<ClipEventRow>) -> Result<()> {
        self.with_state(|s| s.clip_events.extend(rows));
        Ok(())
    }
    async fn append_health_metrics(&self, rows: Vec<StreamHealthMetricRow>) -> Result<()> {
        self.with_state(|s| s.health_metrics.extend(rows));
        Ok(())
    }

    async fn record_usage(&self, record: UsageRecord) -> Result<()> {
        self.with_state(|s| s.usage.push(record));
        Ok(())
    }
}

#[async_trait]
impl AnalyticsReader for MemoryOlapSink {
    async fn health_summary(
        &self,
        tenant_id: TenantId,
        _window: Duration,
    ) -> Result<Option<HealthSummary>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.health_summaries.get(&tenant_id).copied())
    }

    async fn qoe_summary(
        &self,
        tenant_id: TenantId,
        _window: Duration,
    ) -> Result<Option<ClientQoeSummary>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.qoe_summaries.get(&tenant_id).copied())
    }

    async fn node_perf_history(
        &self,
        node_id: &str,
        _window: Duration,
    ) -> Result<Vec<NodePerfRecord>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.node_perf.get(node_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use frameworks_model::ReportTrigger;

    fn draft(tenant_id: TenantId) -> ReportDraft {
        ReportDraft {
            tenant_id,
            trigger: ReportTrigger::Heartbeat,
            summary: "summary".to_string(),
            metrics_reviewed: vec!["avg_fps".to_string()],
            root_cause: "unknown".to_string(),
            recommendations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn save_assigns_ids_and_scopes_reads_by_tenant() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        ));
        let store = MemoryReportStore::new(clock);
        let a = TenantId::new();
        let b = TenantId::new();

        let first = store.save(draft(a)).await.unwrap();
        let second = store.save(draft(a)).await.unwrap();
        store.save(draft(b)).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(store.list_by_tenant(a, 10).await.unwrap().len(), 2);
        assert!(store.get(b, first.id).await.unwrap().is_none());

        let (page, total) = store.list_paginated(a, 1, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn read_at_transition_is_monotonic() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        ));
        let store = MemoryReportStore::new(clock.clone());
        let tenant = TenantId::new();

        let report = store.save(draft(tenant)).await.unwrap();
        store.save(draft(tenant)).await.unwrap();
        assert_eq!(store.unread_count(tenant).await.unwrap(), 2);

        let marked = store
            .mark_read(tenant, MarkRead::Ids(vec![report.id]))
            .await
            .unwrap();
        assert_eq!(marked, 1);
        let read_at = store.get(tenant, report.id).await.unwrap().unwrap().read_at;
        assert!(read_at.is_some());

        // Re-marking moves nothing and the original stamp survives.
        clock.advance(Duration::hours(1));
        let marked_again = store.mark_read(tenant, MarkRead::All).await.unwrap();
        assert_eq!(marked_again, 1);
        assert_eq!(
            store.get(tenant, report.id).await.unwrap().unwrap().read_at,
            read_at
        );
        assert_eq!(store.unread_count(tenant).await.unwrap(), 0);
    }
}
