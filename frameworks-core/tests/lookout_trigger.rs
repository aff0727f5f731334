//! Lookout trigger behavior: incident messages must never block the
//! consumer partition.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use frameworks_core::agent::investigation::InvestigationWorkflow;
use frameworks_core::agent::lookout::{LookoutConfig, LookoutTrigger};
use frameworks_core::clock::ManualClock;
use frameworks_core::database::memory::{MemoryOlapSink, MemoryReportStore};
use frameworks_core::database::ports::ReportStore;
use frameworks_core::runtime::{IncidentChannelSource, run_lookout};
use frameworks_model::{HealthSummary, ReportTrigger, TenantId};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::*;

struct Harness {
    tenant: TenantId,
    trigger: LookoutTrigger,
    orchestrator: Arc<StubOrchestrator>,
    reports: Arc<MemoryReportStore>,
}

fn harness(tier: i32, replies: Vec<&str>, stage_snapshot: bool) -> Harness {
    let tenant = TenantId::new();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ));
    let olap = Arc::new(MemoryOlapSink::default());
    if stage_snapshot {
        olap.set_health_summary(tenant, HealthSummary::default());
    }
    let reports = Arc::new(MemoryReportStore::new(clock.clone()));
    let orchestrator = Arc::new(StubOrchestrator::with_replies(replies));

    let investigation = InvestigationWorkflow::new(
        orchestrator.clone(),
        reports.clone(),
        Arc::new(RecordingNotifier::default()),
        olap.clone(),
        clock,
    );
    let trigger = LookoutTrigger::new(
        LookoutConfig::default(),
        Arc::new(StaticBilling {
            tiers: HashMap::from([(tenant, tier)]),
            emails: HashMap::new(),
        }),
        Arc::new(StaticStreams::live(tenant, 1)),
        olap,
        investigation,
    );

    Harness {
        tenant,
        trigger,
        orchestrator,
        reports,
    }
}

#[tokio::test]
async fn malformed_message_is_acknowledged() {
    let h = harness(3, vec![], true);
    h.trigger
        .handle_raw(&CancellationToken::new(), b"{nonsense")
        .await
        .unwrap();
    assert_eq!(h.orchestrator.call_count(), 0);
}

#[tokio::test]
async fn missing_tenant_is_acknowledged() {
    let h = harness(3, vec![], true);
    let payload = json!({"summary": "node fell over", "severity": "critical"});
    h.trigger
        .handle_raw(&CancellationToken::new(), payload.to_string().as_bytes())
        .await
        .unwrap();
    assert_eq!(h.orchestrator.call_count(), 0);
}

#[tokio::test]
async fn eligible_incident_runs_an_investigation() {
    let h = harness(
        3,
        vec![r#"{"summary":"viewer drop traced to node-2","root_cause":"node-2 network flap"}"#],
        true,
    );
    let payload = json!({
        "tenant_id": h.tenant,
        "summary": "viewer counts collapsed",
        "severity": "critical",
    });

    h.trigger
        .handle_raw(&CancellationToken::new(), payload.to_string().as_bytes())
        .await
        .unwrap();

    assert_eq!(h.orchestrator.call_count(), 1);
    let reports = h.reports.list_by_tenant(h.tenant, 10).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].trigger, ReportTrigger::Lookout);
    // The incident summary rode along as the trigger reason.
    let calls = h.orchestrator.calls.lock().unwrap();
    assert!(calls[0][1].content.contains("viewer counts collapsed"));
}

#[tokio::test]
async fn severity_stands_in_for_an_empty_summary() {
    let h = harness(3, vec![r#"{"summary":"s","root_cause":"r"}"#], true);
    let payload = json!({"tenant_id": h.tenant, "summary": "", "severity": "major"});

    h.trigger
        .handle_raw(&CancellationToken::new(), payload.to_string().as_bytes())
        .await
        .unwrap();

    let calls = h.orchestrator.calls.lock().unwrap();
    assert!(calls[0][1].content.contains("incident severity: major"));
}

#[tokio::test]
async fn ineligible_tier_skips_without_orchestrator_calls() {
    let h = harness(0, vec![], true);
    let payload = json!({"tenant_id": h.tenant, "summary": "x", "severity": "minor"});
    h.trigger
        .handle_raw(&CancellationToken::new(), payload.to_string().as_bytes())
        .await
        .unwrap();
    assert_eq!(h.orchestrator.call_count(), 0);
}

#[tokio::test]
async fn missing_snapshot_acknowledges_without_investigating() {
    let h = harness(3, vec![], false);
    let payload = json!({"tenant_id": h.tenant, "summary": "x", "severity": "minor"});
    h.trigger
        .handle_raw(&CancellationToken::new(), payload.to_string().as_bytes())
        .await
        .unwrap();
    assert_eq!(h.orchestrator.call_count(), 0);
}

#[tokio::test]
async fn lookout_driver_drains_the_incident_channel() {
    let h = harness(
        3,
        vec![r#"{"summary":"s","root_cause":"r"}"#],
        true,
    );
    let tenant = h.tenant;
    let orchestrator = h.orchestrator.clone();
    let reports = h.reports.clone();

    let (sender, source) = IncidentChannelSource::new(8);
    let driver = tokio::spawn(run_lookout(
        source,
        Arc::new(h.trigger),
        CancellationToken::new(),
    ));

    let payload = json!({"tenant_id": tenant, "summary": "node flap", "severity": "major"});
    sender
        .send(payload.to_string().into_bytes())
        .await
        .unwrap();
    // A malformed payload must not stall the driver.
    sender.send(b"{broken".to_vec()).await.unwrap();
    drop(sender);
    driver.await.unwrap();

    assert_eq!(orchestrator.call_count(), 1);
    assert_eq!(reports.list_by_tenant(tenant, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn analytics_outage_returns_success_to_the_bus() {
    // Same harness, but the analytics reader fails every call.
    let tenant = TenantId::new();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ));
    let olap = Arc::new(MemoryOlapSink::default());
    let orchestrator = Arc::new(StubOrchestrator::with_replies(vec![]));
    let investigation = InvestigationWorkflow::new(
        orchestrator.clone(),
        Arc::new(MemoryReportStore::new(clock.clone())),
        Arc::new(RecordingNotifier::default()),
        olap,
        clock,
    );
    let trigger = LookoutTrigger::new(
        LookoutConfig::default(),
        Arc::new(StaticBilling {
            tiers: HashMap::from([(tenant, 3)]),
            emails: HashMap::new(),
        }),
        Arc::new(StaticStreams::live(tenant, 1)),
        Arc::new(FailingAnalytics),
        investigation,
    );

    let payload = json!({"tenant_id": tenant, "summary": "x", "severity": "minor"});
    trigger
        .handle_raw(&CancellationToken::new(), payload.to_string().as_bytes())
        .await
        .unwrap();
    assert_eq!(orchestrator.call_count(), 0);
}
