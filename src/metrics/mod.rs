// src/metrics/mod.rs
mod registry;

pub use registry::{HistogramStats, MetricsRegistry, MetricsSnapshot};

/// Metric names shared between the health monitor and the request path.
pub mod names {
    pub const PROXY_REQUESTS_TOTAL: &str = "proxy_requests_total";
    pub const PROXY_REQUESTS_FAILED_TOTAL: &str = "proxy_requests_failed_total";
    pub const PROXY_REQUEST_DURATION_MS: &str = "proxy_request_duration_ms";
    pub const HEALTH_PROBE_FAILURES_TOTAL: &str = "health_probe_failures_total";
    pub const HEALTH_PROBE_DURATION_MS: &str = "health_probe_duration_ms";
    pub const HEALTHY_TARGETS: &str = "healthy_targets";
    pub const TOTAL_TARGETS: &str = "total_targets";
}
