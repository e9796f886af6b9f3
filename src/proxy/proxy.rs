// src/proxy/proxy.rs

use crate::metrics::{names, MetricsRegistry};
use crate::proxy::{Forwarder, HttpForwarder};
use crate::selector::TargetSelector;
use hyper::{Body, Request, Response};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The healthy set is empty. A terminal outcome for the current request,
    /// not a retry trigger.
    #[error("No healthy targets available")]
    NoHealthyTarget,

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let (status, message) = match err {
            ProxyError::NoHealthyTarget => (503, "No healthy targets available"),
            ProxyError::Upstream(_) => (502, "Bad gateway"),
        };

        Response::builder()
            .status(status)
            .body(Body::from(message))
            .unwrap_or_default()
    }
}

/// The request path: pick a healthy target, hand off to the forwarder,
/// record the outcome. Never blocks on a live probe.
pub struct Proxy {
    selector: TargetSelector,
    forwarder: Arc<dyn Forwarder>,
    metrics: Arc<MetricsRegistry>,
}

impl Proxy {
    pub fn new(selector: TargetSelector, metrics: Arc<MetricsRegistry>) -> Self {
        Self::with_forwarder(selector, Arc::new(HttpForwarder::new()), metrics)
    }

    pub fn with_forwarder(
        selector: TargetSelector,
        forwarder: Arc<dyn Forwarder>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            selector,
            forwarder,
            metrics,
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let target = self
            .selector
            .select_target()
            .ok_or(ProxyError::NoHealthyTarget)?;

        debug!("Forwarding {} {} to {}", req.method(), req.uri().path(), target);

        let start = std::time::Instant::now();
        let result = self.forwarder.forward(&target, req).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                let success = !response.status().is_server_error();
                self.record_request_outcome(&target, duration_ms, success);
                Ok(response)
            }
            Err(e) => {
                self.record_request_outcome(&target, duration_ms, false);
                Err(ProxyError::Upstream(e.to_string()))
            }
        }
    }

    pub fn record_request_outcome(&self, target: &str, duration_ms: u64, success: bool) {
        self.metrics.increment(names::PROXY_REQUESTS_TOTAL);
        if !success {
            self.metrics.increment(names::PROXY_REQUESTS_FAILED_TOTAL);
        }
        self.metrics
            .record_histogram(names::PROXY_REQUEST_DURATION_MS, duration_ms as f64);

        debug!(
            "Request to {} finished in {}ms (success={})",
            target, duration_ms, success
        );
    }
}
