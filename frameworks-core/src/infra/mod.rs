//! The infrastructure monitor: a periodic sweep over clusters and nodes.
//!
//! One sweep per tick, driven externally. Detection layers, in order: hard
//! thresholds, persistence confirmation (CPU/memory only), baseline
//! deviation context, and per-alert cooldown. Disk alerts fire immediately
//! because disk does not self-heal.

pub mod email;
pub mod persistence;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use frameworks_model::{
    ClusterSummary, InfraAlert, InfraAlertKind, NodeSnapshot, TenantId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::database::ports::{AnalyticsReader, BillingDirectory, ClusterDirectory, Mailer};
use crate::error::Result;
use crate::triage::{BaselineEvaluator, TriageCooldown};

use email::render_infra_alert_email;
use persistence::{PerfMetric, confirm_persistence};

const METRIC_CPU: &str = "node_cpu";
const METRIC_MEMORY: &str = "node_memory";
const METRIC_DISK: &str = "node_disk";

#[derive(Debug, Clone)]
pub struct InfraMonitorConfig {
    /// Minimum interval between two alerts sharing a key.
    pub cooldown: Duration,
    /// Nodes whose last sample is older than this are ignored.
    pub stale_threshold: Duration,
    /// How far back the rollup history for persistence confirmation reaches.
    pub persistence_window: Duration,
    /// Expected rollup records inside the window.
    pub persistence_windows: usize,
    /// Violating records required to confirm.
    pub persistence_min_violate: usize,
    pub cpu_threshold: f64,
    pub memory_threshold: f64,
    pub disk_warning: f64,
    pub disk_critical: f64,
    /// Clusters per directory page.
    pub page_size: u32,
}

impl Default for InfraMonitorConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::hours(4),
            stale_threshold: Duration::minutes(10),
            persistence_window: Duration::minutes(20),
            persistence_windows: 4,
            persistence_min_violate: 3,
            cpu_threshold: 95.0,
            memory_threshold: 95.0,
            disk_warning: 90.0,
            disk_critical: 95.0,
            page_size: 100,
        }
    }
}

/// Outcome counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub clusters_seen: usize,
    pub nodes_evaluated: usize,
    pub nodes_stale: usize,
    pub alerts_sent: usize,
    pub alerts_suppressed: usize,
    pub drift_records: usize,
}

pub struct InfraMonitor {
    config: InfraMonitorConfig,
    clusters: Arc<dyn ClusterDirectory>,
    billing: Arc<dyn BillingDirectory>,
    analytics: Arc<dyn AnalyticsReader>,
    mailer: Arc<dyn Mailer>,
    baseline: BaselineEvaluator,
    cooldown: TriageCooldown,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InfraMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfraMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InfraMonitor {
    pub fn new(
        config: InfraMonitorConfig,
        clusters: Arc<dyn ClusterDirectory>,
        billing: Arc<dyn BillingDirectory>,
        analytics: Arc<dyn AnalyticsReader>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cooldown = TriageCooldown::new(config.cooldown, clock.clone());
        Self {
            config,
            clusters,
            billing,
            analytics,
            mailer,
            baseline: BaselineEvaluator::default(),
            cooldown,
            clock,
        }
    }

    /// One sweep over every active, owned cluster. A node appearing in
    /// multiple clusters is evaluated once; the first cluster wins.
    pub async fn sweep(&self, cancel: &CancellationToken) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        let mut seen_nodes: HashSet<String> = HashSet::new();
        let mut after: Option<String> = None;

        loop {
            let page = self
                .clusters
                .list_clusters(after.clone(), self.config.page_size)
                .await?;

            for cluster in &page.items {
                if cancel.is_cancelled() {
                    info!("infra sweep cancelled");
                    return Ok(stats);
                }
                if !cluster.is_active {
                    continue;
                }
                let Some(owner) = cluster.owner_tenant else {
                    debug!(cluster_id = %cluster.cluster_id, "cluster has no owner tenant, skipping");
                    continue;
                };
                stats.clusters_seen += 1;

                let nodes = match self.clusters.list_nodes(&cluster.cluster_id).await {
                    Ok(nodes) => nodes,
                    Err(err) => {
                        warn!(cluster_id = %cluster.cluster_id, error = %err, "node listing failed");
                        continue;
                    }
                };

                for node in nodes {
                    if !seen_nodes.insert(node.node_id.clone()) {
                        continue;
                    }
                    self.evaluate_node(cluster, owner, &node, &mut stats).await;
                }
            }

            if !page.has_next_page {
                break;
            }
            match page.end_cursor {
                Some(cursor) if !cursor.is_empty() => after = Some(cursor),
                _ => break,
            }
        }

        info!(
            clusters = stats.clusters_seen,
            nodes = stats.nodes_evaluated,
            stale = stats.nodes_stale,
            sent = stats.alerts_sent,
            suppressed = stats.alerts_suppressed,
            drift = stats.drift_records,
            "infra sweep complete"
        );
        Ok(stats)
    }

    async fn evaluate_node(
        &self,
        cluster: &ClusterSummary,
        owner: TenantId,
        node: &NodeSnapshot,
        stats: &mut SweepStats,
    ) {
        let now = self.clock.now();
        if now - node.updated_at > self.config.stale_threshold {
            stats.nodes_stale += 1;
            debug!(node_id = %node.node_id, "node sample stale, skipping");
            return;
        }
        stats.nodes_evaluated += 1;

        let cpu = node.cpu_percent;
        let mem = percent(node.ram_used, node.ram_total);
        let disk = percent(node.disk_used, node.disk_total);

        // Deviations are computed against history only, then the same
        // observations are folded in.
        let baseline_key = format!("node:{}", node.node_id);
        let observations = [
            (METRIC_CPU, cpu),
            (METRIC_MEMORY, mem),
            (METRIC_DISK, disk),
        ];
        let deviations = self.baseline.deviations(owner, &baseline_key, &observations);
        self.baseline.update(owner, &baseline_key, &observations);

        let baseline_for = |metric: &str| {
            self.baseline
                .mean(owner, &baseline_key, metric)
                .unwrap_or(0.0)
        };

        let mut alerts: Vec<InfraAlert> = Vec::new();
        let make_alert = |kind: InfraAlertKind, current: f64, threshold: f64, baseline: f64| {
            InfraAlert {
                node_id: node.node_id.clone(),
                cluster_id: cluster.cluster_id.clone(),
                cluster_name: cluster.cluster_name.clone(),
                alert_type: kind,
                current,
                threshold,
                baseline,
                detected_at: now,
            }
        };

        if cpu >= self.config.cpu_threshold
            && self.confirm(&node.node_id, PerfMetric::Cpu, self.config.cpu_threshold).await
        {
            alerts.push(make_alert(
                InfraAlertKind::CpuStuck,
                cpu,
                self.config.cpu_threshold,
                baseline_for(METRIC_CPU),
            ));
        }
        if mem >= self.config.memory_threshold
            && self
                .confirm(&node.node_id, PerfMetric::Memory, self.config.memory_threshold)
                .await
        {
            alerts.push(make_alert(
                InfraAlertKind::MemoryExhaustion,
                mem,
                self.config.memory_threshold,
                baseline_for(METRIC_MEMORY),
            ));
        }
        // Disk does not self-heal: no persistence gate.
        if disk >= self.config.disk_critical {
            alerts.push(make_alert(
                InfraAlertKind::DiskCritical,
                disk,
                self.config.disk_critical,
                baseline_for(METRIC_DISK),
            ));
        } else if disk >= self.config.disk_warning {
            alerts.push(make_alert(
                InfraAlertKind::DiskWarning,
                disk,
                self.config.disk_warning,
                baseline_for(METRIC_DISK),
            ));
        }

        if alerts.is_empty() {
            for deviation in &deviations {
                stats.drift_records += 1;
                info!(
                    node_id = %node.node_id,
                    metric = %deviation.metric,
                    current = deviation.current,
                    baseline = deviation.baseline,
                    sigma = deviation.sigma,
                    direction = ?deviation.direction,
                    "baseline drift"
                );
            }
            return;
        }

        let sendable: Vec<InfraAlert> = alerts
            .into_iter()
            .filter(|alert| {
                let key = format!("infra:{}:{}", alert.node_id, alert.alert_type.as_str());
                if self.cooldown.should_flag(&key) {
                    true
                } else {
                    stats.alerts_suppressed += 1;
                    debug!(%key, "alert suppressed by cooldown");
                    false
                }
            })
            .collect();
        if sendable.is_empty() {
            return;
        }

        self.dispatch(cluster, owner, &node.node_id, sendable, stats)
            .await;
    }

    async fn confirm(&self, node_id: &str, metric: PerfMetric, threshold: f64) -> bool {
        let history = match self
            .analytics
            .node_perf_history(node_id, self.config.persistence_window)
            .await
        {
            Ok(history) => history,
            Err(err) => {
                warn!(%node_id, error = %err, "rollup history unavailable, treating spike as unconfirmed");
                return false;
            }
        };
        confirm_persistence(
            &history,
            metric,
            threshold,
            self.config.persistence_windows,
            self.config.persistence_min_violate,
        )
    }

    /// Owner resolution prefers the per-node owner, then the cluster owner;
    /// with no billing email on file the alert is logged and dropped.
    /// Mailer failures are logged, never propagated.
    async fn dispatch(
        &self,
        cluster: &ClusterSummary,
        cluster_owner: TenantId,
        node_id: &str,
        alerts: Vec<InfraAlert>,
        stats: &mut SweepStats,
    ) {
        let owner = match self.clusters.node_owner(node_id).await {
            Ok(Some(node_owner)) => node_owner,
            Ok(None) => cluster_owner,
            Err(err) => {
                warn!(%node_id, error = %err, "node owner lookup failed, using cluster owner");
                cluster_owner
            }
        };

        let email = match self.billing.billing_email(owner).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                warn!(%node_id, tenant_id = %owner, "no billing email resolved, dropping alert");
                return;
            }
            Err(err) => {
                warn!(%node_id, tenant_id = %owner, error = %err, "billing email lookup failed, dropping alert");
                return;
            }
        };

        let rendered = match render_infra_alert_email(&alerts) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(%node_id, error = %err, "alert rendering failed");
                return;
            }
        };

        match self.mailer.send(&email, &rendered.subject, &rendered.html).await {
            Ok(()) => {
                stats.alerts_sent += alerts.len();
                info!(
                    %node_id,
                    cluster_id = %cluster.cluster_id,
                    alerts = alerts.len(),
                    to = %email,
                    "infrastructure alert sent"
                );
            }
            Err(err) => {
                warn!(%node_id, error = %err, "alert email send failed");
            }
        }
    }
}

/// Percentage with a zero-total guard.
fn percent(used: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_guards_zero_totals() {
        assert_eq!(percent(10, 0), 0.0);
        assert_eq!(percent(10, -5), 0.0);
        assert!((percent(48, 64) - 75.0).abs() < 1e-9);
    }
}
