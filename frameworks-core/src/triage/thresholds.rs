//! Hard-threshold evaluation over a tenant health snapshot.

use frameworks_model::{HealthSnapshot, ThresholdViolation, TriageMetric};

/// Warning limits. Values come from config; these defaults match the
/// platform-wide ones.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdConfig {
    pub warning_buffer: f64,
    pub warning_fps: f64,
    pub warning_bitrate: f64,
    pub warning_issue_count: i64,
    pub warning_packet_loss: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warning_buffer: 1.5,
            warning_fps: 24.0,
            warning_bitrate: 800_000.0,
            warning_issue_count: 1,
            warning_packet_loss: 0.02,
        }
    }
}

/// Pure check: equal snapshots yield equal violation sequences, and a
/// snapshot with zero active streams never yields any.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdTrigger {
    config: ThresholdConfig,
}

impl ThresholdTrigger {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn check(&self, snapshot: &HealthSnapshot) -> Vec<ThresholdViolation> {
        if snapshot.active_streams == 0 {
            return Vec::new();
        }

        let mut violations = Vec::new();
        let cfg = &self.config;

        if let Some(health) = &snapshot.health {
            if health.avg_buffer_health > 0.0 && health.avg_buffer_health < cfg.warning_buffer {
                violations.push(ThresholdViolation {
                    metric: TriageMetric::AvgBufferHealth,
                    value: health.avg_buffer_health,
                    limit: cfg.warning_buffer,
                    message: format!(
                        "average buffer health {:.2}s is below {:.2}s",
                        health.avg_buffer_health, cfg.warning_buffer
                    ),
                });
            }
            if health.avg_fps > 0.0 && health.avg_fps < cfg.warning_fps {
                violations.push(ThresholdViolation {
                    metric: TriageMetric::AvgFps,
                    value: health.avg_fps,
                    limit: cfg.warning_fps,
                    message: format!(
                        "average fps {:.1} is below {:.1}",
                        health.avg_fps, cfg.warning_fps
                    ),
                });
            }
            if health.avg_bitrate > 0.0 && health.avg_bitrate < cfg.warning_bitrate {
                violations.push(ThresholdViolation {
                    metric: TriageMetric::AvgBitrate,
                    value: health.avg_bitrate,
                    limit: cfg.warning_bitrate,
                    message: format!(
                        "average bitrate {:.0} bps is below {:.0} bps",
                        health.avg_bitrate, cfg.warning_bitrate
                    ),
                });
            }
            if health.total_issue_count >= cfg.warning_issue_count {
                violations.push(ThresholdViolation {
                    metric: TriageMetric::TotalIssueCount,
                    value: health.total_issue_count as f64,
                    limit: cfg.warning_issue_count as f64,
                    message: format!(
                        "{} stream issue(s) reported in the window",
                        health.total_issue_count
                    ),
                });
            }
        }

        if let Some(qoe) = &snapshot.client_qoe {
            if qoe.avg_packet_loss >= cfg.warning_packet_loss {
                violations.push(ThresholdViolation {
                    metric: TriageMetric::AvgPacketLoss,
                    value: qoe.avg_packet_loss,
                    limit: cfg.warning_packet_loss,
                    message: format!(
                        "average packet loss {:.1}% is at or above {:.1}%",
                        qoe.avg_packet_loss * 100.0,
                        cfg.warning_packet_loss * 100.0
                    ),
                });
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use frameworks_model::{ClientQoeSummary, HealthSummary, TenantId};

    fn snapshot(active: u64, health: HealthSummary, qoe: ClientQoeSummary) -> HealthSnapshot {
        HealthSnapshot {
            tenant_id: TenantId::new(),
            active_streams: active,
            window: Duration::minutes(15),
            health: Some(health),
            client_qoe: Some(qoe),
        }
    }

    fn healthy() -> HealthSummary {
        HealthSummary {
            avg_buffer_health: 3.0,
            avg_fps: 30.0,
            avg_bitrate: 5_000_000.0,
            total_issue_count: 0,
            sample_count: 120,
        }
    }

    #[test]
    fn healthy_snapshot_yields_no_violations() {
        let trigger = ThresholdTrigger::default();
        let snap = snapshot(
            3,
            healthy(),
            ClientQoeSummary {
                avg_packet_loss: 0.01,
                avg_bandwidth: 8_000_000.0,
                session_count: 40,
            },
        );
        assert!(trigger.check(&snap).is_empty());
    }

    #[test]
    fn zero_active_streams_always_yields_empty() {
        let trigger = ThresholdTrigger::default();
        let degraded = HealthSummary {
            avg_buffer_health: 0.2,
            avg_fps: 5.0,
            avg_bitrate: 100_000.0,
            total_issue_count: 9,
            sample_count: 3,
        };
        let snap = snapshot(
            0,
            degraded,
            ClientQoeSummary {
                avg_packet_loss: 0.5,
                avg_bandwidth: 0.0,
                session_count: 0,
            },
        );
        assert!(trigger.check(&snap).is_empty());
    }

    #[test]
    fn degraded_snapshot_reports_every_breach_in_order() {
        let trigger = ThresholdTrigger::default();
        let snap = snapshot(
            2,
            HealthSummary {
                avg_buffer_health: 1.0,
                avg_fps: 20.0,
                avg_bitrate: 400_000.0,
                total_issue_count: 2,
                sample_count: 50,
            },
            ClientQoeSummary {
                avg_packet_loss: 0.05,
                avg_bandwidth: 2_000_000.0,
                session_count: 10,
            },
        );

        let violations = trigger.check(&snap);
        let metrics: Vec<_> = violations.iter().map(|v| v.metric).collect();
        assert_eq!(
            metrics,
            vec![
                TriageMetric::AvgBufferHealth,
                TriageMetric::AvgFps,
                TriageMetric::AvgBitrate,
                TriageMetric::TotalIssueCount,
                TriageMetric::AvgPacketLoss,
            ]
        );
    }

    #[test]
    fn zero_valued_averages_are_not_breaches() {
        // A window with no samples reports zeroed averages; those must not
        // trip the "below" limits.
        let trigger = ThresholdTrigger::default();
        let snap = snapshot(1, HealthSummary::default(), ClientQoeSummary::default());
        let violations = trigger.check(&snap);
        assert!(violations.is_empty());
    }

    #[test]
    fn check_is_deterministic() {
        let trigger = ThresholdTrigger::default();
        let snap = snapshot(
            2,
            HealthSummary {
                avg_buffer_health: 1.2,
                avg_fps: 18.0,
                avg_bitrate: 900_000.0,
                total_issue_count: 0,
                sample_count: 10,
            },
            ClientQoeSummary::default(),
        );
        assert_eq!(trigger.check(&snap), trigger.check(&snap));
    }
}
