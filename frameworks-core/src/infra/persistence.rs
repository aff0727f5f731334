//! Persistence confirmation: a transient spike must be sustained across a
//! majority of recent rollup windows before it becomes an alert.

use frameworks_model::NodePerfRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerfMetric {
    Cpu,
    Memory,
}

/// Counts rollup records whose metric average is at or above the threshold.
/// With fewer than `expected_windows` records on hand the requirement drops
/// to `min(min_violate, record_count)`.
pub fn confirm_persistence(
    records: &[NodePerfRecord],
    metric: PerfMetric,
    threshold: f64,
    expected_windows: usize,
    min_violate: usize,
) -> bool {
    let violations = records
        .iter()
        .filter(|r| {
            let avg = match metric {
                PerfMetric::Cpu => r.cpu_avg,
                PerfMetric::Memory => r.mem_avg,
            };
            avg >= threshold
        })
        .count();

    let required = if records.len() < expected_windows {
        min_violate.min(records.len())
    } else {
        min_violate
    };
    violations >= required
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn records(cpu: &[f64]) -> Vec<NodePerfRecord> {
        let start = Utc::now();
        cpu.iter()
            .enumerate()
            .map(|(i, avg)| NodePerfRecord {
                bucket: start + Duration::minutes(5 * i as i64),
                cpu_avg: *avg,
                mem_avg: 0.0,
            })
            .collect()
    }

    #[test]
    fn three_of_four_confirms() {
        let history = records(&[97.0, 97.0, 97.0, 50.0]);
        assert!(confirm_persistence(&history, PerfMetric::Cpu, 95.0, 4, 3));
    }

    #[test]
    fn two_of_four_does_not_confirm() {
        let history = records(&[97.0, 97.0, 50.0, 50.0]);
        assert!(!confirm_persistence(&history, PerfMetric::Cpu, 95.0, 4, 3));
    }

    #[test]
    fn one_of_four_does_not_confirm() {
        let history = records(&[99.0, 50.0, 40.0, 45.0]);
        assert!(!confirm_persistence(&history, PerfMetric::Cpu, 95.0, 4, 3));
    }

    #[test]
    fn short_history_lowers_the_bar() {
        let history = records(&[97.0, 98.0]);
        assert!(confirm_persistence(&history, PerfMetric::Cpu, 95.0, 4, 3));

        let mixed = records(&[97.0, 50.0]);
        assert!(!confirm_persistence(&mixed, PerfMetric::Cpu, 95.0, 4, 3));
    }

    #[test]
    fn memory_reads_the_memory_column() {
        let start = Utc::now();
        let history: Vec<_> = [96.0, 97.0, 98.0, 96.0]
            .iter()
            .enumerate()
            .map(|(i, avg)| NodePerfRecord {
                bucket: start + Duration::minutes(5 * i as i64),
                cpu_avg: 10.0,
                mem_avg: *avg,
            })
            .collect();
        assert!(confirm_persistence(&history, PerfMetric::Memory, 95.0, 4, 3));
        assert!(!confirm_persistence(&history, PerfMetric::Cpu, 95.0, 4, 3));
    }
}
