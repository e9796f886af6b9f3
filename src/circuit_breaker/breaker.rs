// src/circuit_breaker/breaker.rs

use crate::config::CircuitBreakerConfig;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Time source for cooldown expiry, injectable so breaker tests never sleep.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed, // Normal operation, probes proceed
    Open,   // Cooling down, probes skipped
}

/// Per-target probe guard.
///
/// Opens after `failure_threshold` consecutive probe failures and stays open
/// for a fixed cooldown. There is no canary half-open state: once the window
/// expires the next probe cycle simply treats the breaker as closed again and
/// probes. A failure after reopening trips it straight back open, since the
/// consecutive-failure count only resets on success.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    consecutive_failures: AtomicU32,
    open_until: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            consecutive_failures: AtomicU32::new(0),
            open_until: RwLock::new(None),
        }
    }

    /// Whether the next probe may proceed. An expired cooldown window is
    /// cleared here, which is the only Open -> Closed transition.
    pub async fn probe_permitted(&self) -> bool {
        let open_until = self.open_until.read().await;
        match *open_until {
            None => true,
            Some(until) => {
                if self.clock.now() >= until {
                    drop(open_until);
                    let mut open_until = self.open_until.write().await;
                    *open_until = None;
                    tracing::info!("Circuit breaker cooldown expired, resuming probes");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut open_until = self.open_until.write().await;
        *open_until = None;
    }

    pub async fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;

        if failures >= self.config.failure_threshold {
            let mut open_until = self.open_until.write().await;
            *open_until = Some(self.clock.now() + self.config.cooldown());

            tracing::warn!(
                "Circuit breaker opened after {} consecutive failures, cooling down for {:?}",
                failures,
                self.config.cooldown()
            );
        }
    }

    pub async fn state(&self) -> CircuitBreakerState {
        let open_until = self.open_until.read().await;
        match *open_until {
            Some(until) if self.clock.now() < until => CircuitBreakerState::Open,
            _ => CircuitBreakerState::Closed,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

/// One breaker per target URL, created on demand.
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            clock,
        }
    }

    pub fn get_or_create(&self, target: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(target.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(self.config.clone(), self.clock.clone()))
            })
            .clone()
    }
}


#[cfg(test)]
mod tests {
    use super::test_clock::ManualClock;
    use super::*;
    use std::time::Duration;

    fn breaker_with_clock(threshold: u32, cooldown_ms: u64) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown_ms,
        };
        (CircuitBreaker::new(config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn stays_closed_below_threshold() {
        let (breaker, _clock) = breaker_with_clock(3, 1000);

        breaker.record_failure().await;
        breaker.record_failure().await;

        assert_eq!(breaker.state().await, CircuitBreakerState::Closed);
        assert!(breaker.probe_permitted().await);
    }

    #[tokio::test]
    async fn opens_at_threshold() {
        let (breaker, _clock) = breaker_with_clock(3, 1000);

        for _ in 0..3 {
            breaker.record_failure().await;
        }

        assert_eq!(breaker.state().await, CircuitBreakerState::Open);
        assert!(!breaker.probe_permitted().await);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let (breaker, _clock) = breaker_with_clock(3, 1000);

        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        breaker.record_failure().await;

        assert_eq!(breaker.state().await, CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn reopens_after_cooldown_then_permits() {
        let (breaker, clock) = breaker_with_clock(2, 1000);

        breaker.record_failure().await;
        breaker.record_failure().await;
        assert!(!breaker.probe_permitted().await);

        clock.advance(Duration::from_millis(999));
        assert!(!breaker.probe_permitted().await);

        clock.advance(Duration::from_millis(1));
        assert!(breaker.probe_permitted().await);
        assert_eq!(breaker.state().await, CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn failure_after_cooldown_trips_immediately() {
        let (breaker, clock) = breaker_with_clock(2, 1000);

        breaker.record_failure().await;
        breaker.record_failure().await;
        clock.advance(Duration::from_millis(1000));
        assert!(breaker.probe_permitted().await);

        // Count never reset, so one more failure re-opens the window.
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitBreakerState::Open);
    }

    #[tokio::test]
    async fn manager_reuses_breaker_per_target() {
        let clock = Arc::new(ManualClock::new());
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig::default(), clock);

        let a1 = manager.get_or_create("a:1");
        a1.record_failure().await;
        let a2 = manager.get_or_create("a:1");

        assert_eq!(a2.consecutive_failures(), 1);
        assert_eq!(manager.get_or_create("b:2").consecutive_failures(), 0);
    }
}
