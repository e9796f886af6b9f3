// src/server/handler.rs

use crate::config::ConfigSummary;
use crate::health::{HealthMonitor, OverallHealth};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::proxy::{Proxy, ProxyError};
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Method, Request, Response};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::{error, warn};

/// Everything the handler needs, constructed once in main and shared.
pub struct AppState {
    pub proxy: Proxy,
    pub monitor: Arc<HealthMonitor>,
    pub metrics: Arc<MetricsRegistry>,
    pub config_summary: ConfigSummary,
    pub started_at: std::time::Instant,
}

/// Routes /health and /metrics locally; everything else goes to the proxy.
#[derive(Clone)]
pub struct RequestHandler {
    state: Arc<AppState>,
}

impl RequestHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        Box::pin(async move { Ok(route(state, req).await) })
    }
}

pub async fn route(state: Arc<AppState>, req: Request<Body>) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => health_response(&state),
        (&Method::GET, "/metrics") => metrics_response(&state),
        _ => match state.proxy.handle(req).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    ProxyError::NoHealthyTarget => warn!("Rejecting request: {}", err),
                    ProxyError::Upstream(_) => error!("Proxy error: {}", err),
                }
                err.into()
            }
        },
    }
}

fn health_response(state: &AppState) -> Response<Body> {
    let report = state.monitor.report();
    let status = if report.status == OverallHealth::Unhealthy {
        503
    } else {
        200
    };
    json_response(status, &report)
}

#[derive(Serialize)]
struct MetricsPayload {
    #[serde(flatten)]
    snapshot: MetricsSnapshot,
    uptime_seconds: u64,
    memory_usage: Option<u64>,
    config_summary: ConfigSummary,
}

fn metrics_response(state: &AppState) -> Response<Body> {
    let payload = MetricsPayload {
        snapshot: state.metrics.snapshot(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        memory_usage: resident_memory_bytes(),
        config_summary: state.config_summary.clone(),
    };
    json_response(200, &payload)
}

fn json_response<T: Serialize>(status: u16, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .unwrap_or_default(),
        Err(e) => {
            error!("Failed to build telemetry payload: {}", e);
            Response::builder()
                .status(500)
                .body(Body::from("Internal error"))
                .unwrap_or_default()
        }
    }
}

/// Resident set size in bytes, from /proc on Linux. None elsewhere.
fn resident_memory_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
        let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
        Some(kb * 1024)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
