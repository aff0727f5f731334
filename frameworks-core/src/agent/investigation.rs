//! The investigation workflow: run the tool-using orchestrator, persist the
//! resulting report, and deliver it.

use std::sync::Arc;

use frameworks_model::{
    HealthSnapshot, Recommendation, Report, ReportDraft, ReportTrigger, TenantId, UsageRecord,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::database::ports::{
    ChatMessage, OlapSink, Orchestrator, ReportNotifier, ReportStore, TokenCounts,
};
use crate::error::{CoreError, Result};

use super::decision::extract_json;
use super::prompts::{INVESTIGATION_SYSTEM_PROMPT, format_metrics_prompt};

/// What the model is asked to return; anything unparseable falls back to a
/// raw-content report.
#[derive(Debug, Deserialize)]
struct ReportBody {
    summary: String,
    #[serde(default)]
    metrics_reviewed: Vec<String>,
    #[serde(default)]
    root_cause: Option<String>,
    #[serde(default)]
    recommendations: Vec<Recommendation>,
}

pub struct InvestigationWorkflow {
    orchestrator: Arc<dyn Orchestrator>,
    reports: Arc<dyn ReportStore>,
    notifier: Arc<dyn ReportNotifier>,
    olap: Arc<dyn OlapSink>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InvestigationWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvestigationWorkflow").finish_non_exhaustive()
    }
}

impl InvestigationWorkflow {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        reports: Arc<dyn ReportStore>,
        notifier: Arc<dyn ReportNotifier>,
        olap: Arc<dyn OlapSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orchestrator,
            reports,
            notifier,
            olap,
            clock,
        }
    }

    /// Runs one investigation for the tenant. Token usage is recorded
    /// whether or not the run succeeds; persistence failures do not block
    /// notification; notification failures are logged, never propagated.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        tenant_id: TenantId,
        trigger: ReportTrigger,
        reason: &str,
        snapshot: &HealthSnapshot,
    ) -> Result<Report> {
        let messages = [
            ChatMessage::system(INVESTIGATION_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "{}\nTrigger: {} - {}",
                format_metrics_prompt(snapshot),
                trigger.as_str(),
                reason
            )),
        ];

        let reply = match self.orchestrator.run(cancel, &messages, None).await {
            Ok(reply) => reply,
            Err(err) => {
                self.record_usage(tenant_id, TokenCounts::default()).await;
                return Err(CoreError::InvestigationFailed(err.to_string()));
            }
        };
        self.record_usage(tenant_id, reply.usage).await;

        let draft = parse_report(tenant_id, trigger, &reply.content);
        let report = match self.reports.save(draft.clone()).await {
            Ok(report) => report,
            Err(err) => {
                // Best effort: deliver the unpersisted report anyway.
                error!(%tenant_id, error = %err, "report persistence failed");
                Report {
                    id: 0,
                    tenant_id: draft.tenant_id,
                    trigger: draft.trigger,
                    summary: draft.summary,
                    metrics_reviewed: draft.metrics_reviewed,
                    root_cause: draft.root_cause,
                    recommendations: draft.recommendations,
                    created_at: self.clock.now(),
                    read_at: None,
                }
            }
        };

        if let Err(err) = self.notifier.notify(&report).await {
            warn!(%tenant_id, report_id = report.id, error = %err, "report notification failed");
        } else {
            info!(%tenant_id, report_id = report.id, trigger = trigger.as_str(), "investigation report delivered");
        }

        Ok(report)
    }

    async fn record_usage(&self, tenant_id: TenantId, usage: TokenCounts) {
        let record = UsageRecord {
            tenant_id,
            component: "investigation".to_string(),
            prompt_tokens: usage.prompt,
            completion_tokens: usage.completion,
            recorded_at: self.clock.now(),
        };
        if let Err(err) = self.olap.record_usage(record).await {
            warn!(%tenant_id, error = %err, "failed to record orchestrator usage");
        }
    }
}

/// Parses the orchestrator's answer into a report draft. On failure the
/// whole content becomes the summary, the root cause is "unknown", and the
/// trigger is preserved.
pub fn parse_report(tenant_id: TenantId, trigger: ReportTrigger, content: &str) -> ReportDraft {
    if let Some(span) = extract_json(content) {
        if let Ok(body) = serde_json::from_str::<ReportBody>(span) {
            return ReportDraft {
                tenant_id,
                trigger,
                summary: body.summary,
                metrics_reviewed: body.metrics_reviewed,
                root_cause: body.root_cause.unwrap_or_else(|| "unknown".to_string()),
                recommendations: body.recommendations,
            };
        }
    }
    ReportDraft {
        tenant_id,
        trigger,
        summary: content.to_string(),
        metrics_reviewed: Vec::new(),
        root_cause: "unknown".to_string(),
        recommendations: Vec::new(),
    }
}
