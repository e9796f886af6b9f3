// src/config/models.rs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("target list is empty")]
    NoTargets,

    #[error("duplicate target: {0}")]
    DuplicateTarget(String),

    #[error("target {0} is not a valid host:port address")]
    InvalidTarget(String),

    #[error("circuit breaker failure_threshold must be >= 1")]
    ZeroFailureThreshold,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Backend targets as host:port strings.
    pub targets: Vec<String>,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Path probed on each target.
    #[serde(default = "default_probe_path")]
    pub path: String,

    /// Highest status code still considered alive. 499 means any non-5xx
    /// counts as healthy: a 404 proves the process is up.
    #[serde(default = "default_max_healthy_status")]
    pub max_healthy_status: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_probe_path() -> String {
    "/".to_string()
}

fn default_max_healthy_status() -> u16 {
    499
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_ms() -> u64 {
    60_000
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
            path: default_probe_path(),
            max_healthy_status: default_max_healthy_status(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            // Targets are bare host:port with an explicit port. Url::port()
            // hides ports matching the scheme default, so split it off first.
            let (host, port) = target
                .rsplit_once(':')
                .ok_or_else(|| ConfigError::InvalidTarget(target.clone()))?;
            if port.parse::<u16>().is_err() {
                return Err(ConfigError::InvalidTarget(target.clone()));
            }
            let parsed = Url::parse(&format!("http://{}", host))
                .map_err(|_| ConfigError::InvalidTarget(target.clone()))?;
            if parsed.host_str().is_none() || parsed.path() != "/" || parsed.query().is_some() {
                return Err(ConfigError::InvalidTarget(target.clone()));
            }
            if !seen.insert(target.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.clone()));
            }
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }

        Ok(())
    }

    /// Subset of the configuration exposed under `config_summary` in /metrics.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            targets: self.targets.clone(),
            health_check_interval_ms: self.health_check.interval_ms,
            health_check_timeout_ms: self.health_check.timeout_ms,
            max_healthy_status: self.health_check.max_healthy_status,
            circuit_breaker_failure_threshold: self.circuit_breaker.failure_threshold,
            circuit_breaker_cooldown_ms: self.circuit_breaker.cooldown_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub targets: Vec<String>,
    pub health_check_interval_ms: u64,
    pub health_check_timeout_ms: u64,
    pub max_healthy_status: u16,
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_cooldown_ms: u64,
}
