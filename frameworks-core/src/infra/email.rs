//! Templated alert email assembly.
//!
//! Pure string building; the SMTP transport lives behind the `Mailer` port.

use frameworks_model::{AlertSeverity, InfraAlert, InfraAlertKind, Report};

use crate::error::{CoreError, Result};

/// A rendered outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

const CRITICAL_COLOR: &str = "#dc2626";
const WARNING_COLOR: &str = "#d97706";

fn severity_color(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Critical => CRITICAL_COLOR,
        AlertSeverity::Warning => WARNING_COLOR,
    }
}

fn action_item(kind: InfraAlertKind) -> &'static str {
    match kind {
        InfraAlertKind::CpuStuck => {
            "Inspect runaway processes on the node and restart the media server if it is pinned."
        }
        InfraAlertKind::MemoryExhaustion => {
            "Check the media server for leaks and drain sessions before the OOM killer does it for you."
        }
        InfraAlertKind::DiskWarning => {
            "Prune old recordings and transcode artifacts to reclaim disk."
        }
        InfraAlertKind::DiskCritical => {
            "Free disk space immediately; recordings and segments on this node are at risk."
        }
    }
}

/// Renders the operator alert email for one node's confirmed alerts.
///
/// The overall severity is CRITICAL if any alert is critical. The subject
/// carries a comma-joined list of short issue labels in alert order; action
/// items are deduplicated per alert type, followed by two standing operator
/// CLI items.
pub fn render_infra_alert_email(alerts: &[InfraAlert]) -> Result<RenderedEmail> {
    let first = alerts.first().ok_or(CoreError::NoAlerts)?;

    let severity = alerts
        .iter()
        .map(|a| a.severity())
        .max()
        .unwrap_or(AlertSeverity::Warning);

    let issues = alerts
        .iter()
        .map(|a| a.alert_type.issue_label())
        .collect::<Vec<_>>()
        .join(", ");

    let subject = format!(
        "[FrameWorks] Infrastructure Alert: {} on {}/{} - {}",
        severity.as_str(),
        first.cluster_name,
        first.node_id,
        issues
    );

    let mut rows = String::new();
    for alert in alerts {
        let color = severity_color(alert.severity());
        rows.push_str(&format!(
            "<tr>\
             <td style=\"padding:6px 12px;border-bottom:1px solid #e5e7eb;\">{}</td>\
             <td style=\"padding:6px 12px;border-bottom:1px solid #e5e7eb;\">{}</td>\
             <td style=\"padding:6px 12px;border-bottom:1px solid #e5e7eb;\">{:.1}%</td>\
             <td style=\"padding:6px 12px;border-bottom:1px solid #e5e7eb;\">{:.1}%</td>\
             <td style=\"padding:6px 12px;border-bottom:1px solid #e5e7eb;color:{};font-weight:bold;\">{}</td>\
             </tr>",
            alert.node_id,
            alert.alert_type.issue_label(),
            alert.current,
            alert.threshold,
            color,
            alert.severity().as_str()
        ));
        if alert.baseline > 0.0 {
            rows.push_str(&format!(
                "<tr><td colspan=\"5\" style=\"padding:2px 12px 8px;color:#6b7280;font-size:12px;\">\
                 Baseline average: {:.1}%</td></tr>",
                alert.baseline
            ));
        }
    }

    let mut actions = String::new();
    let mut seen = Vec::new();
    for alert in alerts {
        if seen.contains(&alert.alert_type) {
            continue;
        }
        seen.push(alert.alert_type);
        actions.push_str(&format!("<li>{}</li>", action_item(alert.alert_type)));
    }
    actions.push_str(&format!(
        "<li>Run <code>fwctl node status {}</code> for a live resource view.</li>",
        first.node_id
    ));
    actions.push_str(&format!(
        "<li>Run <code>fwctl node drain {}</code> to move streams off the node.</li>",
        first.node_id
    ));

    let html = format!(
        "<html><body style=\"font-family:Helvetica,Arial,sans-serif;color:#111827;\">\
         <h2 style=\"color:{};\">{} infrastructure alert</h2>\
         <p>Cluster <strong>{}</strong> ({}), node <strong>{}</strong>, detected at {}.</p>\
         <table style=\"border-collapse:collapse;width:100%;\">\
         <tr style=\"text-align:left;background:#f9fafb;\">\
         <th style=\"padding:6px 12px;\">Node</th>\
         <th style=\"padding:6px 12px;\">Issue</th>\
         <th style=\"padding:6px 12px;\">Current</th>\
         <th style=\"padding:6px 12px;\">Threshold</th>\
         <th style=\"padding:6px 12px;\">Severity</th>\
         </tr>{}</table>\
         <h3>Action items</h3><ul>{}</ul>\
         </body></html>",
        severity_color(severity),
        severity.as_str(),
        first.cluster_name,
        first.cluster_id,
        first.node_id,
        first.detected_at.format("%Y-%m-%d %H:%M:%S UTC"),
        rows,
        actions
    );

    Ok(RenderedEmail { subject, html })
}

/// Renders the tenant-facing investigation report email.
pub fn render_report_email(report: &Report) -> RenderedEmail {
    let subject = format!(
        "[FrameWorks] Stream Triage Report ({})",
        report.trigger.as_str()
    );

    let mut recommendations = String::new();
    if report.recommendations.is_empty() {
        recommendations.push_str("<li>No specific action recommended.</li>");
    } else {
        for rec in &report.recommendations {
            recommendations.push_str(&format!(
                "<li>{} <em style=\"color:#6b7280;\">(confidence: {:?})</em></li>",
                rec.text, rec.confidence
            ));
        }
    }

    let metrics = if report.metrics_reviewed.is_empty() {
        "none recorded".to_string()
    } else {
        report.metrics_reviewed.join(", ")
    };

    let html = format!(
        "<html><body style=\"font-family:Helvetica,Arial,sans-serif;color:#111827;\">\
         <h2>Stream triage report</h2>\
         <p>{}</p>\
         <p><strong>Root cause:</strong> {}</p>\
         <p><strong>Metrics reviewed:</strong> {}</p>\
         <h3>Recommendations</h3><ul>{}</ul>\
         <p style=\"color:#6b7280;font-size:12px;\">Generated {}.</p>\
         </body></html>",
        report.summary,
        report.root_cause,
        metrics,
        recommendations,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    RenderedEmail { subject, html }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn alert(kind: InfraAlertKind, current: f64, baseline: f64) -> InfraAlert {
        InfraAlert {
            node_id: "node-7".to_string(),
            cluster_id: "c-1".to_string(),
            cluster_name: "eu-west".to_string(),
            alert_type: kind,
            current,
            threshold: 95.0,
            baseline,
            detected_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(
            render_infra_alert_email(&[]),
            Err(CoreError::NoAlerts)
        ));
    }

    #[test]
    fn subject_joins_issues_in_alert_order() {
        let rendered = render_infra_alert_email(&[
            alert(InfraAlertKind::CpuStuck, 99.0, 0.0),
            alert(InfraAlertKind::DiskWarning, 91.0, 0.0),
        ])
        .unwrap();

        assert_eq!(
            rendered.subject,
            "[FrameWorks] Infrastructure Alert: CRITICAL on eu-west/node-7 - CPU stuck, disk warning"
        );
    }

    #[test]
    fn warning_only_alerts_render_warning_severity() {
        let rendered =
            render_infra_alert_email(&[alert(InfraAlertKind::DiskWarning, 91.0, 0.0)]).unwrap();
        assert!(rendered.subject.contains("WARNING"));
        assert!(rendered.html.contains(WARNING_COLOR));
        assert!(!rendered.html.contains(CRITICAL_COLOR));
    }

    #[test]
    fn baseline_row_appears_only_when_known() {
        let with = render_infra_alert_email(&[alert(InfraAlertKind::CpuStuck, 99.0, 42.5)]).unwrap();
        assert!(with.html.contains("Baseline average: 42.5%"));

        let without =
            render_infra_alert_email(&[alert(InfraAlertKind::CpuStuck, 99.0, 0.0)]).unwrap();
        assert!(!without.html.contains("Baseline average"));
    }

    #[test]
    fn action_items_dedupe_and_keep_cli_items_last() {
        let rendered = render_infra_alert_email(&[
            alert(InfraAlertKind::CpuStuck, 99.0, 0.0),
            alert(InfraAlertKind::CpuStuck, 98.0, 0.0),
            alert(InfraAlertKind::MemoryExhaustion, 97.0, 0.0),
        ])
        .unwrap();

        let cpu_item = action_item(InfraAlertKind::CpuStuck);
        assert_eq!(rendered.html.matches(cpu_item).count(), 1);

        let status_pos = rendered.html.find("fwctl node status").unwrap();
        let drain_pos = rendered.html.find("fwctl node drain").unwrap();
        let mem_pos = rendered
            .html
            .find(action_item(InfraAlertKind::MemoryExhaustion))
            .unwrap();
        assert!(mem_pos < status_pos);
        assert!(status_pos < drain_pos);
    }

    #[test]
    fn percents_render_to_one_decimal() {
        let rendered =
            render_infra_alert_email(&[alert(InfraAlertKind::DiskCritical, 96.04, 0.0)]).unwrap();
        assert!(rendered.html.contains("96.0%"));
        assert!(rendered.html.contains("95.0%"));
    }
}
