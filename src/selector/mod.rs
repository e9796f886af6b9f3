// src/selector/mod.rs

use crate::health::HealthMonitor;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Picks one target out of the currently healthy set.
pub trait SelectionPolicy: Send + Sync {
    fn select<'a>(&self, healthy: &'a [String]) -> Option<&'a str>;

    fn name(&self) -> &'static str;
}

/// Uniform random pick with no memory between calls. Balances statistically
/// over many requests but makes no per-request fairness guarantee; this is
/// deliberately not round-robin.
pub struct RandomPolicy;

impl SelectionPolicy for RandomPolicy {
    fn select<'a>(&self, healthy: &'a [String]) -> Option<&'a str> {
        healthy.choose(&mut rand::thread_rng()).map(|s| s.as_str())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Request-path view over the monitor's last-known healthy snapshot. Reads
/// never wait on a live probe.
pub struct TargetSelector {
    monitor: Arc<HealthMonitor>,
    policy: Arc<dyn SelectionPolicy>,
}

impl TargetSelector {
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self::with_policy(monitor, Arc::new(RandomPolicy))
    }

    pub fn with_policy(monitor: Arc<HealthMonitor>, policy: Arc<dyn SelectionPolicy>) -> Self {
        Self { monitor, policy }
    }

    /// None means no target is currently available; the caller answers 503
    /// rather than retrying.
    pub fn select_target(&self) -> Option<String> {
        let healthy = self.monitor.healthy_targets();
        self.policy.select(healthy.as_slice()).map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn empty_set_selects_nothing() {
        assert_eq!(RandomPolicy.select(&[]), None);
    }

    #[test]
    fn single_target_always_selected() {
        let healthy = vec!["a:1".to_string()];
        for _ in 0..50 {
            assert_eq!(RandomPolicy.select(&healthy), Some("a:1"));
        }
    }

    #[test]
    fn selection_stays_within_the_healthy_set() {
        let healthy = vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()];
        let allowed: HashSet<&str> = healthy.iter().map(|s| s.as_str()).collect();

        let mut seen = HashSet::new();
        for _ in 0..500 {
            let picked = RandomPolicy.select(&healthy).unwrap();
            assert!(allowed.contains(picked));
            seen.insert(picked.to_string());
        }
        // 500 draws over 3 targets miss one with probability (2/3)^500.
        assert_eq!(seen.len(), 3);
    }
}
