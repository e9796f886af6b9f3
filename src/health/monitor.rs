// src/health/monitor.rs

use crate::circuit_breaker::{CircuitBreakerManager, Clock};
use crate::config::{CircuitBreakerConfig, HealthCheckConfig};
use crate::health::{HealthDetails, HealthReport, OverallHealth, TargetHealth};
use crate::metrics::{names, MetricsRegistry};
use anyhow::Result;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use reqwest::Client;
use std::sync::Arc;
use tokio::time::{interval, timeout};
use tracing::{debug, error, info, warn};

/// Owns the authoritative health snapshot and drives its refresh.
///
/// A background loop probes every configured target concurrently once per
/// interval; the request path only ever reads the last-known snapshot and
/// never waits on a live probe. Targets whose circuit breaker is open are
/// skipped for the whole cycle and keep their last recorded state.
pub struct HealthMonitor {
    config: HealthCheckConfig,
    targets: Vec<String>,
    health: DashMap<String, TargetHealth>,
    breakers: CircuitBreakerManager,
    client: Client,
    metrics: Arc<MetricsRegistry>,
    healthy_snapshot: ArcSwap<Vec<String>>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Debug)]
struct ProbeOutcome {
    target: String,
    healthy: bool,
    error: Option<String>,
}

impl HealthMonitor {
    pub fn new(
        config: HealthCheckConfig,
        targets: Vec<String>,
        breaker_config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        Ok(Self {
            config,
            targets,
            health: DashMap::new(),
            breakers: CircuitBreakerManager::new(breaker_config, clock),
            client,
            metrics,
            healthy_snapshot: ArcSwap::from_pointee(Vec::new()),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Run probe cycles until [`stop`](Self::stop) is called. The first cycle
    /// runs immediately, then once per configured interval. Call once per
    /// monitor: a second call would drive a second, overlapping loop.
    pub async fn start(self: Arc<Self>) {
        let mut interval = interval(self.config.interval());
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            "Starting health monitor for {} targets, interval {:?}",
            self.targets.len(),
            self.config.interval()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.clone().run_probe_cycle().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Health monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Cancel future cycles. In-flight probes settle on their own.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Probe every configured target concurrently, skipping open breakers,
    /// then refresh the healthy snapshot and the aggregate gauges. Probes
    /// settle independently; one target failing or panicking never affects
    /// another's outcome.
    pub async fn run_probe_cycle(self: Arc<Self>) {
        let mut tasks = Vec::new();
        let mut skipped = 0usize;

        for target in &self.targets {
            let breaker = self.breakers.get_or_create(target);
            if !breaker.probe_permitted().await {
                debug!("Skipping probe of {}: circuit breaker open", target);
                skipped += 1;
                continue;
            }

            let monitor = self.clone();
            let target = target.clone();
            tasks.push(tokio::spawn(
                async move { monitor.probe_target(&target).await },
            ));
        }

        let results = futures::future::join_all(tasks).await;

        let mut healthy_count = 0usize;
        let mut unhealthy_count = 0usize;
        for result in results {
            match result {
                Ok(outcome) => {
                    if outcome.healthy {
                        healthy_count += 1;
                        debug!("Target {} is healthy", outcome.target);
                    } else {
                        unhealthy_count += 1;
                        warn!("Target {} is unhealthy: {:?}", outcome.target, outcome.error);
                    }
                }
                Err(e) => {
                    error!("Probe task join error: {}", e);
                }
            }
        }

        self.refresh_snapshot();

        info!(
            "Probe cycle complete: {} healthy, {} unhealthy, {} skipped (breaker open)",
            healthy_count, unhealthy_count, skipped
        );
    }

    async fn probe_target(&self, target: &str) -> ProbeOutcome {
        let start = std::time::Instant::now();
        let url = format!("http://{}{}", target, self.config.path);

        let result = timeout(self.config.timeout(), self.client.get(&url).send()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.as_u16() <= self.config.max_healthy_status {
                    Ok(())
                } else {
                    Err(format!("HTTP {}", status))
                }
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("Probe timeout".to_string()),
        };

        let was_healthy = self.health.get(target).map(|h| h.healthy);
        let breaker = self.breakers.get_or_create(target);

        match outcome {
            Ok(()) => {
                self.health
                    .insert(target.to_string(), TargetHealth::up(target, elapsed_ms));
                self.metrics
                    .record_histogram(names::HEALTH_PROBE_DURATION_MS, elapsed_ms as f64);
                breaker.record_success().await;

                if was_healthy == Some(false) {
                    info!("Target {} recovered ({}ms)", target, elapsed_ms);
                }
                ProbeOutcome {
                    target: target.to_string(),
                    healthy: true,
                    error: None,
                }
            }
            Err(error) => {
                self.health
                    .insert(target.to_string(), TargetHealth::down(target, error.clone()));
                self.metrics.increment(names::HEALTH_PROBE_FAILURES_TOTAL);
                breaker.record_failure().await;

                if was_healthy != Some(false) {
                    warn!("Target {} went unhealthy: {}", target, error);
                }
                ProbeOutcome {
                    target: target.to_string(),
                    healthy: false,
                    error: Some(error),
                }
            }
        }
    }

    fn refresh_snapshot(&self) {
        let healthy: Vec<String> = self
            .health
            .iter()
            .filter(|entry| entry.healthy)
            .map(|entry| entry.key().clone())
            .collect();

        self.metrics
            .set_gauge(names::HEALTHY_TARGETS, healthy.len() as f64);
        self.metrics
            .set_gauge(names::TOTAL_TARGETS, self.targets.len() as f64);
        self.healthy_snapshot.store(Arc::new(healthy));
    }

    /// Last-known healthy set, lock-free. Order is not meaningful.
    pub fn healthy_targets(&self) -> Arc<Vec<String>> {
        self.healthy_snapshot.load_full()
    }

    /// All health records, in configured-target order. Targets never probed
    /// yet have no record.
    pub fn health_status(&self) -> Vec<TargetHealth> {
        self.targets
            .iter()
            .filter_map(|t| self.health.get(t).map(|h| h.clone()))
            .collect()
    }

    pub fn overall_health(&self) -> OverallHealth {
        let healthy = self.healthy_snapshot.load().len();
        OverallHealth::from_counts(healthy, self.targets.len())
    }

    /// Full /health payload as of the current snapshot.
    pub fn report(&self) -> HealthReport {
        let targets = self.health_status();
        let healthy_targets = targets.iter().filter(|t| t.healthy).count();

        HealthReport {
            status: self.overall_health(),
            details: HealthDetails {
                healthy_targets,
                total_targets: self.targets.len(),
                targets,
            },
        }
    }
}
