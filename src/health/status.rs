// src/health/status.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Last-known probe outcome for one configured target. Created on the
/// target's first probe and mutated only by the monitor's probe cycle.
#[derive(Debug, Clone, Serialize)]
pub struct TargetHealth {
    pub url: String,
    pub healthy: bool,
    #[serde(rename = "responseTime", skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(rename = "lastCheck")]
    pub last_checked_at: DateTime<Utc>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TargetHealth {
    pub fn up(url: &str, response_time_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            healthy: true,
            response_time_ms: Some(response_time_ms),
            last_checked_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn down(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            healthy: false,
            response_time_ms: None,
            last_checked_at: Utc::now(),
            last_error: Some(error),
        }
    }
}

/// Tri-state summary over the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallHealth {
    pub fn from_counts(healthy: usize, total: usize) -> Self {
        if healthy == total && total > 0 {
            OverallHealth::Healthy
        } else if healthy == 0 {
            OverallHealth::Unhealthy
        } else {
            OverallHealth::Degraded
        }
    }
}

/// Body served on GET /health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallHealth,
    pub details: HealthDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub healthy_targets: usize,
    pub total_targets: usize,
    pub targets: Vec<TargetHealth>,
}
