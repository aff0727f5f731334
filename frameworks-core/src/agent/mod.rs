//! The heartbeat agent: a tenant-scoped periodic health sweep.
//!
//! Threshold-first, LLM-on-demand: hard limits are checked before any model
//! call, and the orchestrator only decides the ambiguous middle. A failure
//! or panic in one tenant's processing never aborts the cycle.

pub mod decision;
pub mod investigation;
pub mod lookout;
pub mod notify;
pub mod prompts;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Duration;
use futures::FutureExt;
use frameworks_model::{HealthSnapshot, ReportDraft, ReportTrigger, TenantId, UsageRecord};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::database::ports::{
    AnalyticsReader, BillingDirectory, ChatMessage, OlapSink, Orchestrator, ReportStore,
    StreamDirectory, TenantRegistry, TenantSummary,
};
use crate::error::{CoreError, Result};
use crate::triage::{ThresholdConfig, ThresholdTrigger};

use decision::parse_decision;
use investigation::InvestigationWorkflow;
use prompts::{DECISION_SYSTEM_PROMPT, format_metrics_prompt};

/// Agent tuning knobs; all defaulted per platform configuration.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Cycle period; consumed by the runtime driver, not the agent itself.
    pub interval: std::time::Duration,
    /// Minimum billing tier level that gets agent coverage.
    pub required_tier_level: i32,
    /// Trailing window for health and QoE summaries.
    pub window: Duration,
    /// When set, only currently-live streams count toward eligibility.
    pub consider_active_only: bool,
    pub thresholds: ThresholdConfig,
    /// Streams per directory page.
    pub page_size: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(30 * 60),
            required_tier_level: 1,
            window: Duration::minutes(15),
            consider_active_only: true,
            thresholds: ThresholdConfig::default(),
            page_size: 100,
        }
    }
}

/// Everything the agent talks to. All reads go through ports so tests can
/// wire deterministic fakes.
pub struct HeartbeatDeps {
    pub tenants: Arc<dyn TenantRegistry>,
    pub billing: Arc<dyn BillingDirectory>,
    pub streams: Arc<dyn StreamDirectory>,
    pub analytics: Arc<dyn AnalyticsReader>,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub olap: Arc<dyn OlapSink>,
    pub reports: Arc<dyn ReportStore>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for HeartbeatDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatDeps").finish_non_exhaustive()
    }
}

/// Outcome counters for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub tenants_seen: usize,
    pub tenants_skipped: usize,
    pub healthy: usize,
    pub investigations: usize,
    pub flags: usize,
    pub failures: usize,
}

enum TenantOutcome {
    Skipped,
    Healthy,
    Investigated,
    Flagged,
}

#[derive(Debug)]
pub struct HeartbeatAgent {
    config: HeartbeatConfig,
    deps: HeartbeatDeps,
    trigger: ThresholdTrigger,
    investigation: InvestigationWorkflow,
}

impl HeartbeatAgent {
    pub fn new(
        config: HeartbeatConfig,
        deps: HeartbeatDeps,
        investigation: InvestigationWorkflow,
    ) -> Self {
        let trigger = ThresholdTrigger::new(config.thresholds);
        Self {
            config,
            deps,
            trigger,
            investigation,
        }
    }

    pub fn interval(&self) -> std::time::Duration {
        self.config.interval
    }

    /// One full sweep over the eligible tenants. Per-tenant failures and
    /// panics are captured and counted; only a missing tenant registry
    /// aborts the cycle.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleStats> {
        let tenants = self.deps.tenants.list_active_tenants().await.map_err(|e| {
            error!(error = %e, "tenant registry unavailable, skipping heartbeat cycle");
            e
        })?;

        let mut stats = CycleStats::default();
        for tenant in tenants {
            if cancel.is_cancelled() {
                info!("heartbeat cycle cancelled mid-sweep");
                break;
            }
            stats.tenants_seen += 1;

            let outcome = AssertUnwindSafe(self.process_tenant(cancel, &tenant))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(TenantOutcome::Skipped)) => stats.tenants_skipped += 1,
                Ok(Ok(TenantOutcome::Healthy)) => stats.healthy += 1,
                Ok(Ok(TenantOutcome::Investigated)) => stats.investigations += 1,
                Ok(Ok(TenantOutcome::Flagged)) => stats.flags += 1,
                Ok(Err(err)) => {
                    stats.failures += 1;
                    warn!(tenant_id = %tenant.id, error = %err, "tenant heartbeat failed");
                }
                Err(panic) => {
                    stats.failures += 1;
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(tenant_id = %tenant.id, panic = %msg, "tenant heartbeat panicked");
                }
            }
        }

        info!(
            seen = stats.tenants_seen,
            skipped = stats.tenants_skipped,
            healthy = stats.healthy,
            investigations = stats.investigations,
            flags = stats.flags,
            failures = stats.failures,
            "heartbeat cycle complete"
        );
        Ok(stats)
    }

    async fn process_tenant(
        &self,
        cancel: &CancellationToken,
        tenant: &TenantSummary,
    ) -> Result<TenantOutcome> {
        let tier = self.deps.billing.tier_level(tenant.id).await?;
        if tier < self.config.required_tier_level {
            return Ok(TenantOutcome::Skipped);
        }

        let active_streams = count_live_streams(
            self.deps.streams.as_ref(),
            tenant.id,
            self.config.page_size,
            self.config.consider_active_only,
        )
        .await?;
        if active_streams == 0 {
            return Ok(TenantOutcome::Skipped);
        }

        let Some(snapshot) = load_snapshot(
            self.deps.analytics.as_ref(),
            tenant.id,
            active_streams,
            self.config.window,
        )
        .await?
        else {
            return Ok(TenantOutcome::Skipped);
        };

        let violations = self.trigger.check(&snapshot);
        if !violations.is_empty() {
            let reason = violations
                .iter()
                .map(|v| v.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            info!(tenant_id = %tenant.id, %reason, "thresholds breached, investigating");
            self.investigation
                .run(cancel, tenant.id, ReportTrigger::Threshold, &reason, &snapshot)
                .await?;
            return Ok(TenantOutcome::Investigated);
        }

        let decision = self.decide(cancel, &snapshot).await?;
        match decision.action.as_str() {
            "investigate" => {
                info!(tenant_id = %tenant.id, reason = %decision.reason, "triage decision: investigate");
                self.investigation
                    .run(
                        cancel,
                        tenant.id,
                        ReportTrigger::Heartbeat,
                        &decision.reason,
                        &snapshot,
                    )
                    .await?;
                Ok(TenantOutcome::Investigated)
            }
            "flag" => {
                let draft = ReportDraft {
                    tenant_id: tenant.id,
                    trigger: ReportTrigger::Flag,
                    summary: decision.reason.clone(),
                    metrics_reviewed: decision.metrics_reviewed.clone(),
                    root_cause: "pending review".to_string(),
                    recommendations: Vec::new(),
                };
                self.deps
                    .reports
                    .save(draft)
                    .await
                    .map_err(|e| CoreError::Persistence(e.to_string()))?;
                info!(tenant_id = %tenant.id, reason = %decision.reason, "triage decision: flagged");
                Ok(TenantOutcome::Flagged)
            }
            "skip" => {
                info!(tenant_id = %tenant.id, "HEARTBEAT_OK");
                Ok(TenantOutcome::Healthy)
            }
            other => {
                warn!(tenant_id = %tenant.id, action = other, "unrecognized triage action, ignoring");
                Ok(TenantOutcome::Healthy)
            }
        }
    }

    /// Runs the decision orchestrator. Usage is recorded even when the
    /// output turns out to be malformed.
    async fn decide(
        &self,
        cancel: &CancellationToken,
        snapshot: &HealthSnapshot,
    ) -> Result<decision::TriageDecision> {
        let messages = [
            ChatMessage::system(DECISION_SYSTEM_PROMPT),
            ChatMessage::user(format_metrics_prompt(snapshot)),
        ];
        let reply = match self.deps.orchestrator.run(cancel, &messages, None).await {
            Ok(reply) => reply,
            Err(err) => {
                self.record_decision_usage(snapshot.tenant_id, 0, 0).await;
                return Err(CoreError::UpstreamTransient(format!(
                    "decision orchestrator: {err}"
                )));
            }
        };
        self.record_decision_usage(snapshot.tenant_id, reply.usage.prompt, reply.usage.completion)
            .await;
        parse_decision(&reply.content)
    }

    async fn record_decision_usage(&self, tenant_id: TenantId, prompt: u64, completion: u64) {
        let record = UsageRecord {
            tenant_id,
            component: "heartbeat-decision".to_string(),
            prompt_tokens: prompt,
            completion_tokens: completion,
            recorded_at: self.deps.clock.now(),
        };
        if let Err(err) = self.deps.olap.record_usage(record).await {
            warn!(%tenant_id, error = %err, "failed to record decision usage");
        }
    }
}

/// Counts a tenant's streams through the cursor-paginated directory.
/// Terminates on `has_next_page = false` or an empty end cursor.
pub(crate) async fn count_live_streams(
    streams: &dyn StreamDirectory,
    tenant_id: TenantId,
    page_size: u32,
    live_only: bool,
) -> Result<u64> {
    let mut count = 0u64;
    let mut after: Option<String> = None;
    loop {
        let page = streams.list_streams(tenant_id, after.clone(), page_size).await?;
        count += page
            .items
            .iter()
            .filter(|s| !live_only || s.is_live)
            .count() as u64;
        if !page.has_next_page {
            break;
        }
        match page.end_cursor {
            Some(cursor) if !cursor.is_empty() => after = Some(cursor),
            _ => break,
        }
    }
    Ok(count)
}

/// Builds the per-cycle snapshot. A missing health summary skips the tenant
/// (`Ok(None)`); a missing QoE summary degrades to health-only.
pub(crate) async fn load_snapshot(
    analytics: &dyn AnalyticsReader,
    tenant_id: TenantId,
    active_streams: u64,
    window: Duration,
) -> Result<Option<HealthSnapshot>> {
    let health = analytics.health_summary(tenant_id, window).await?;
    if health.is_none() {
        return Ok(None);
    }

    let client_qoe = match analytics.qoe_summary(tenant_id, window).await {
        Ok(qoe) => qoe,
        Err(err) => {
            warn!(%tenant_id, error = %err, "QoE summary unavailable, continuing with health only");
            None
        }
    };

    Ok(Some(HealthSnapshot {
        tenant_id,
        active_streams,
        window,
        health,
        client_qoe,
    }))
}
