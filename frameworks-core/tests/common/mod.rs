//! Hand-rolled fakes for the directory, orchestrator, and notification
//! ports.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Duration;
use frameworks_core::database::ports::{
    AnalyticsReader, BillingDirectory, ChatMessage, ChatRole, ClusterDirectory, Mailer,
    Orchestrator, OrchestratorReply, ReportNotifier, ReportStore, StreamDirectory, StreamSummary,
    TenantRegistry, TenantSummary, TokenCounts, TokenStreamer,
};
use frameworks_core::error::{CoreError, Result};
use frameworks_model::{
    ClientQoeSummary, ClusterSummary, HealthSummary, NodePerfRecord, NodeSnapshot, Page, Report,
    TenantId,
};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct StaticTenantRegistry {
    pub tenants: Vec<TenantSummary>,
}

impl StaticTenantRegistry {
    pub fn single(id: TenantId) -> Self {
        Self {
            tenants: vec![TenantSummary {
                id,
                name: "acme".to_string(),
            }],
        }
    }
}

#[async_trait]
impl TenantRegistry for StaticTenantRegistry {
    async fn list_active_tenants(&self) -> Result<Vec<TenantSummary>> {
        Ok(self.tenants.clone())
    }
}

#[derive(Default)]
pub struct StaticBilling {
    pub tiers: HashMap<TenantId, i32>,
    pub emails: HashMap<TenantId, String>,
}

#[async_trait]
impl BillingDirectory for StaticBilling {
    async fn tier_level(&self, tenant_id: TenantId) -> Result<i32> {
        Ok(self.tiers.get(&tenant_id).copied().unwrap_or(0))
    }

    async fn billing_email(&self, tenant_id: TenantId) -> Result<Option<String>> {
        Ok(self.emails.get(&tenant_id).cloned())
    }
}

#[derive(Default)]
pub struct StaticStreams {
    pub streams: HashMap<TenantId, Vec<StreamSummary>>,
}

impl StaticStreams {
    pub fn live(tenant_id: TenantId, count: usize) -> Self {
        let streams = (0..count)
            .map(|i| StreamSummary {
                internal_name: format!("live+stream-{i}"),
                is_live: true,
            })
            .collect();
        Self {
            streams: HashMap::from([(tenant_id, streams)]),
        }
    }
}

#[async_trait]
impl StreamDirectory for StaticStreams {
    async fn list_streams(
        &self,
        tenant_id: TenantId,
        after: Option<String>,
        first: u32,
    ) -> Result<Page<StreamSummary>> {
        let all = self.streams.get(&tenant_id).cloned().unwrap_or_default();
        let start: usize = after.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + first as usize).min(all.len());
        let items = all[start.min(all.len())..end].to_vec();
        let has_next_page = end < all.len();
        Ok(Page {
            items,
            end_cursor: has_next_page.then(|| end.to_string()),
            has_next_page,
        })
    }
}

#[derive(Default)]
pub struct StaticClusters {
    pub clusters: Vec<ClusterSummary>,
    pub nodes: Mutex<HashMap<String, Vec<NodeSnapshot>>>,
    pub node_owners: HashMap<String, TenantId>,
}

impl StaticClusters {
    pub fn new(
        clusters: Vec<ClusterSummary>,
        nodes: HashMap<String, Vec<NodeSnapshot>>,
        node_owners: HashMap<String, TenantId>,
    ) -> Self {
        Self {
            clusters,
            nodes: Mutex::new(nodes),
            node_owners,
        }
    }

    /// Replaces one cluster's node listing, e.g. to refresh `updated_at`
    /// between sweeps.
    pub fn set_nodes(&self, cluster_id: &str, nodes: Vec<NodeSnapshot>) {
        self.nodes
            .lock()
            .unwrap()
            .insert(cluster_id.to_string(), nodes);
    }
}

#[async_trait]
impl ClusterDirectory for StaticClusters {
    async fn list_clusters(
        &self,
        after: Option<String>,
        first: u32,
    ) -> Result<Page<ClusterSummary>> {
        let start: usize = after.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + first as usize).min(self.clusters.len());
        let items = self.clusters[start.min(self.clusters.len())..end].to_vec();
        let has_next_page = end < self.clusters.len();
        Ok(Page {
            items,
            end_cursor: has_next_page.then(|| end.to_string()),
            has_next_page,
        })
    }

    async fn list_nodes(&self, cluster_id: &str) -> Result<Vec<NodeSnapshot>> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .get(cluster_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn node_owner(&self, node_id: &str) -> Result<Option<TenantId>> {
        Ok(self.node_owners.get(node_id).copied())
    }
}

/// Scripted orchestrator: pops canned replies in order and records every
/// call's messages.
pub struct StubOrchestrator {
    replies: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
    pub usage: TokenCounts,
}

impl StubOrchestrator {
    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().map(String::from).collect()),
            calls: Mutex::new(Vec::new()),
            usage: TokenCounts {
                prompt: 420,
                completion: 64,
            },
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The system prompt of the nth call.
    pub fn system_prompt(&self, call: usize) -> String {
        let calls = self.calls.lock().unwrap();
        calls[call]
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Orchestrator for StubOrchestrator {
    async fn run(
        &self,
        _cancel: &CancellationToken,
        messages: &[ChatMessage],
        _streamer: Option<&dyn TokenStreamer>,
    ) -> Result<OrchestratorReply> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| CoreError::UpstreamTransient("stub exhausted".to_string()))?;
        Ok(OrchestratorReply {
            content,
            usage: self.usage,
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, subject, _)| subject.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        self.sent.lock().unwrap().push((
            to.to_string(),
            subject.to_string(),
            html_body.to_string(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notified: Mutex<Vec<Report>>,
}

#[async_trait]
impl ReportNotifier for RecordingNotifier {
    async fn notify(&self, report: &Report) -> Result<()> {
        self.notified.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Analytics reader whose every call fails, for transient-upstream paths.
pub struct FailingAnalytics;

#[async_trait]
impl AnalyticsReader for FailingAnalytics {
    async fn health_summary(
        &self,
        _tenant_id: TenantId,
        _window: Duration,
    ) -> Result<Option<HealthSummary>> {
        Err(CoreError::UpstreamTransient("analytics store down".to_string()))
    }

    async fn qoe_summary(
        &self,
        _tenant_id: TenantId,
        _window: Duration,
    ) -> Result<Option<ClientQoeSummary>> {
        Err(CoreError::UpstreamTransient("analytics store down".to_string()))
    }

    async fn node_perf_history(
        &self,
        _node_id: &str,
        _window: Duration,
    ) -> Result<Vec<NodePerfRecord>> {
        Err(CoreError::UpstreamTransient("analytics store down".to_string()))
    }
}

/// Report store that refuses every save, for persistence-failure paths.
pub struct FailingReportStore;

#[async_trait]
impl ReportStore for FailingReportStore {
    async fn save(&self, _draft: frameworks_model::ReportDraft) -> Result<Report> {
        Err(CoreError::Persistence("reports table unavailable".to_string()))
    }

    async fn list_by_tenant(&self, _tenant_id: TenantId, _limit: u32) -> Result<Vec<Report>> {
        Ok(Vec::new())
    }

    async fn list_paginated(
        &self,
        _tenant_id: TenantId,
        _limit: u32,
        _offset: u32,
    ) -> Result<(Vec<Report>, u64)> {
        Ok((Vec::new(), 0))
    }

    async fn get(&self, _tenant_id: TenantId, _id: i64) -> Result<Option<Report>> {
        Ok(None)
    }

    async fn mark_read(
        &self,
        _tenant_id: TenantId,
        _selection: frameworks_core::database::ports::MarkRead,
    ) -> Result<u64> {
        Ok(0)
    }

    async fn unread_count(&self, _tenant_id: TenantId) -> Result<u64> {
        Ok(0)
    }
}
