//! Keyed min-interval gate against alert repetition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

/// For a given key, at most one `should_flag` returns true per window of
/// `window` length. The map is small; one mutex guards the whole thing, and
/// expired entries are evicted on write so it stays bounded.
#[derive(Debug)]
pub struct TriageCooldown {
    window: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl TriageCooldown {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// True (and records the firing) iff the key has not fired within the
    /// window.
    pub fn should_flag(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(last) = entries.get(key) {
            if now - *last < self.window {
                return false;
            }
        }

        entries.retain(|_, last| now - *last < self.window);
        entries.insert(key.to_string(), now);
        true
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn setup(window_hours: i64) -> (Arc<ManualClock>, TriageCooldown) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        ));
        let cooldown = TriageCooldown::new(Duration::hours(window_hours), clock.clone());
        (clock, cooldown)
    }

    #[test]
    fn at_most_one_firing_per_window() {
        let (clock, cooldown) = setup(4);

        assert!(cooldown.should_flag("infra:node-1:cpu_stuck"));
        assert!(!cooldown.should_flag("infra:node-1:cpu_stuck"));

        clock.advance(Duration::hours(3));
        assert!(!cooldown.should_flag("infra:node-1:cpu_stuck"));

        clock.advance(Duration::hours(1));
        assert!(cooldown.should_flag("infra:node-1:cpu_stuck"));
    }

    #[test]
    fn keys_are_independent() {
        let (_, cooldown) = setup(4);
        assert!(cooldown.should_flag("infra:node-1:cpu_stuck"));
        assert!(cooldown.should_flag("infra:node-2:cpu_stuck"));
        assert!(cooldown.should_flag("infra:node-1:disk_warning"));
    }

    #[test]
    fn expired_entries_are_evicted_on_write() {
        let (clock, cooldown) = setup(4);
        for i in 0..10 {
            assert!(cooldown.should_flag(&format!("infra:node-{i}:cpu_stuck")));
        }
        assert_eq!(cooldown.len(), 10);

        clock.advance(Duration::hours(5));
        assert!(cooldown.should_flag("infra:fresh:cpu_stuck"));
        assert_eq!(cooldown.len(), 1);
    }
}
