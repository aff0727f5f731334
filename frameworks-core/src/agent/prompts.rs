//! Fixed system prompts and metrics prompt formatting for the triage
//! orchestrator.

use frameworks_model::HealthSnapshot;

/// System prompt for the lightweight triage decision. The model must answer
/// with a single JSON object; anything else fails the decision.
pub const DECISION_SYSTEM_PROMPT: &str = "\
You are the triage layer of a live-video control plane. You receive a \
summary of one tenant's streaming health over a recent window and decide \
what happens next.

Respond with a single JSON object and nothing else:
{\"action\": \"investigate\" | \"flag\" | \"skip\", \"reason\": \"<one sentence>\", \
\"metrics_reviewed\": [\"<metric name>\", ...]}

Guidance:
- \"skip\" when the metrics look healthy for a live platform.
- \"flag\" when something looks off but does not yet warrant a full \
diagnostic run; the reason is shown to operators as-is.
- \"investigate\" when the numbers point at active viewer-facing degradation.
Do not invent metrics you were not shown.";

/// System prompt for the full diagnostic workflow. The orchestrator has
/// tool access (metrics queries, stream listings); the final answer must be
/// a JSON report.
pub const INVESTIGATION_SYSTEM_PROMPT: &str = "\
You are a streaming-infrastructure diagnostician for a live-video control \
plane. Investigate the tenant's degradation using the tools available to \
you, then produce your findings.

Respond with a single JSON object and nothing else:
{
  \"summary\": \"<what is happening, one paragraph>\",
  \"metrics_reviewed\": [\"<metric name>\", ...],
  \"root_cause\": \"<most likely cause, or 'unknown'>\",
  \"recommendations\": [
    {\"text\": \"<concrete operator action>\", \"confidence\": \"high\" | \"medium\" | \"low\"}
  ]
}

Keep recommendations actionable: name the stream, node, or setting to touch. \
If the data is inconclusive, say so in root_cause rather than speculating.";

/// Renders the per-tenant snapshot into the prompt the orchestrator sees.
pub fn format_metrics_prompt(snapshot: &HealthSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Tenant {} over the last {} minute(s): {} active stream(s).\n",
        snapshot.tenant_id,
        snapshot.window.num_minutes(),
        snapshot.active_streams
    ));

    match &snapshot.health {
        Some(health) => {
            out.push_str(&format!(
                "Stream health: avg buffer health {:.2}s, avg fps {:.1}, avg bitrate {:.0} bps, \
                 {} issue(s) reported across {} sample(s).\n",
                health.avg_buffer_health,
                health.avg_fps,
                health.avg_bitrate,
                health.total_issue_count,
                health.sample_count
            ));
        }
        None => out.push_str("Stream health: no samples in the window.\n"),
    }

    match &snapshot.client_qoe {
        Some(qoe) => {
            out.push_str(&format!(
                "Client QoE: avg packet loss {:.2}%, avg bandwidth {:.0} bps, {} session(s).\n",
                qoe.avg_packet_loss * 100.0,
                qoe.avg_bandwidth,
                qoe.session_count
            ));
        }
        None => out.push_str("Client QoE: unavailable for this window.\n"),
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use frameworks_model::{HealthSummary, TenantId};

    #[test]
    fn prompt_degrades_without_qoe() {
        let snapshot = HealthSnapshot {
            tenant_id: TenantId::new(),
            active_streams: 2,
            window: Duration::minutes(15),
            health: Some(HealthSummary {
                avg_buffer_health: 2.5,
                avg_fps: 29.9,
                avg_bitrate: 4_000_000.0,
                total_issue_count: 0,
                sample_count: 60,
            }),
            client_qoe: None,
        };
        let prompt = format_metrics_prompt(&snapshot);
        assert!(prompt.contains("2 active stream(s)"));
        assert!(prompt.contains("avg fps 29.9"));
        assert!(prompt.contains("Client QoE: unavailable"));
    }
}
