//! Per-key Welford running statistics.
//!
//! State is keyed by `(tenant, key, metric)` and held in a sharded map so
//! concurrent nodes don't contend on one lock. Callers must query
//! deviations *before* folding the same observation in, so an anomaly does
//! not dilute its own signal.

use dashmap::DashMap;
use frameworks_model::{BaselineDeviation, DeviationDirection, TenantId};

/// Welford running tuple: `(count, mean, m2)`.
#[derive(Debug, Clone, Copy, Default)]
struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Sample variance; needs at least two observations.
    fn variance(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        Some(self.m2 / (self.count - 1) as f64)
    }
}

#[derive(Debug)]
pub struct BaselineEvaluator {
    /// Observations required before deviations are reported for a metric.
    min_samples: u64,
    /// How many standard deviations away counts as anomalous.
    sigma_threshold: f64,
    states: DashMap<(TenantId, String, String), Welford>,
}

impl Default for BaselineEvaluator {
    fn default() -> Self {
        Self::new(10, 3.0)
    }
}

impl BaselineEvaluator {
    pub fn new(min_samples: u64, sigma_threshold: f64) -> Self {
        Self {
            min_samples,
            sigma_threshold,
            states: DashMap::new(),
        }
    }

    /// Folds one observation per metric into the key's running statistics.
    pub fn update(&self, tenant_id: TenantId, key: &str, observations: &[(&str, f64)]) {
        for (metric, value) in observations {
            let mut state = self
                .states
                .entry((tenant_id, key.to_string(), metric.to_string()))
                .or_default();
            state.update(*value);
        }
    }

    /// Reports observations at least `sigma_threshold` standard deviations
    /// from the key's running mean. Metrics with fewer than `min_samples`
    /// observations stay silent.
    pub fn deviations(
        &self,
        tenant_id: TenantId,
        key: &str,
        observations: &[(&str, f64)],
    ) -> Vec<BaselineDeviation> {
        let mut found = Vec::new();
        for (metric, value) in observations {
            let Some(state) = self
                .states
                .get(&(tenant_id, key.to_string(), metric.to_string()))
            else {
                continue;
            };
            if state.count < self.min_samples {
                continue;
            }
            let Some(variance) = state.variance() else {
                continue;
            };
            let sigma = variance.sqrt();
            let delta = (value - state.mean).abs();
            let deviates = if sigma > 0.0 {
                delta >= self.sigma_threshold * sigma
            } else {
                delta > 0.0
            };
            if deviates {
                found.push(BaselineDeviation {
                    metric: metric.to_string(),
                    current: *value,
                    baseline: state.mean,
                    sigma,
                    direction: if *value >= state.mean {
                        DeviationDirection::Above
                    } else {
                        DeviationDirection::Below
                    },
                });
            }
        }
        found
    }

    /// Running mean for one metric, when the key has history.
    pub fn mean(&self, tenant_id: TenantId, key: &str, metric: &str) -> Option<f64> {
        self.states
            .get(&(tenant_id, key.to_string(), metric.to_string()))
            .map(|state| state.mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welford_matches_naive_statistics() {
        let samples = [4.0, 7.0, 13.0, 16.0, 10.0, 9.0, 11.0];
        let mut state = Welford::default();
        for s in samples {
            state.update(s);
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);

        assert!((state.mean - mean).abs() < 1e-9);
        assert!((state.variance().unwrap() - var).abs() < 1e-9);
    }

    #[test]
    fn silent_below_minimum_samples() {
        let baseline = BaselineEvaluator::default();
        let tenant = TenantId::new();
        for _ in 0..9 {
            baseline.update(tenant, "node:a", &[("node_cpu", 20.0)]);
        }
        assert!(baseline
            .deviations(tenant, "node:a", &[("node_cpu", 99.0)])
            .is_empty());
    }

    #[test]
    fn deviation_query_does_not_see_its_own_observation() {
        let baseline = BaselineEvaluator::new(10, 3.0);
        let tenant = TenantId::new();
        // Stable history around 20 with a little jitter.
        for i in 0..20 {
            let jitter = (i % 3) as f64;
            baseline.update(tenant, "node:a", &[("node_cpu", 19.0 + jitter)]);
        }

        let spike = [("node_cpu", 95.0)];
        let before = baseline.deviations(tenant, "node:a", &spike);
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].direction, DeviationDirection::Above);
        assert!(before[0].baseline < 21.0);

        // Folding the spike in shifts the mean; the reported baseline above
        // must have been computed from history only.
        baseline.update(tenant, "node:a", &spike);
        assert!(baseline.mean(tenant, "node:a", "node_cpu").unwrap() > before[0].baseline);
    }

    #[test]
    fn keys_are_isolated_per_tenant() {
        let baseline = BaselineEvaluator::new(2, 3.0);
        let a = TenantId::new();
        let b = TenantId::new();
        for _ in 0..5 {
            baseline.update(a, "node:x", &[("node_cpu", 10.0)]);
        }
        assert!(baseline.mean(b, "node:x", "node_cpu").is_none());
    }
}
