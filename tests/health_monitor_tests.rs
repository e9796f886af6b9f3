// tests/health_monitor_tests.rs
//
// End-to-end checks: probe cycles against real local HTTP backends, then the
// /health, /metrics, and proxy surfaces through the request handler.

use std::sync::Arc;

use hyper::{Body, Request};
use waypoint::circuit_breaker::SystemClock;
use waypoint::config::{CircuitBreakerConfig, Config, HealthCheckConfig};
use waypoint::health::HealthMonitor;
use waypoint::metrics::MetricsRegistry;
use waypoint::proxy::Proxy;
use waypoint::selector::TargetSelector;
use waypoint::server::handler::route;
use waypoint::server::AppState;

fn test_config(targets: Vec<String>) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        targets,
        health_check: HealthCheckConfig {
            interval_ms: 60_000,
            timeout_ms: 1_000,
            path: "/".to_string(),
            max_healthy_status: 499,
        },
        circuit_breaker: CircuitBreakerConfig::default(),
    }
}

fn build_state(config: &Config) -> (Arc<AppState>, Arc<HealthMonitor>) {
    let metrics = Arc::new(MetricsRegistry::new());
    let monitor = Arc::new(
        HealthMonitor::new(
            config.health_check.clone(),
            config.targets.clone(),
            config.circuit_breaker.clone(),
            Arc::new(SystemClock),
            metrics.clone(),
        )
        .unwrap(),
    );

    let proxy = Proxy::new(TargetSelector::new(monitor.clone()), metrics.clone());
    let state = Arc::new(AppState {
        proxy,
        monitor: monitor.clone(),
        metrics,
        config_summary: config.summary(),
        started_at: std::time::Instant::now(),
    });
    (state, monitor)
}

async fn json_body(response: hyper::Response<Body>) -> serde_json::Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_tracks_backend_state() {
    let mut backend_a = mockito::Server::new_async().await;
    let mut backend_b = mockito::Server::new_async().await;
    let _a = backend_a.mock("GET", "/").with_status(200).create_async().await;
    let _b = backend_b.mock("GET", "/").with_status(200).create_async().await;

    let config = test_config(vec![backend_a.host_with_port(), backend_b.host_with_port()]);
    let (state, monitor) = build_state(&config);

    monitor.clone().run_probe_cycle().await;

    let response = route(state.clone(), get("/health")).await;
    assert_eq!(response.status(), 200);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["details"]["healthy_targets"], 2);
    assert_eq!(body["details"]["total_targets"], 2);
    assert_eq!(body["details"]["targets"].as_array().unwrap().len(), 2);

    // Both backends go away: unmatched requests answer 501, which is a
    // probe failure. The next cycle flips the report to unhealthy.
    backend_a.reset_async().await;
    backend_b.reset_async().await;
    monitor.clone().run_probe_cycle().await;

    let response = route(state, get("/health")).await;
    assert_eq!(response.status(), 503);
    let body = json_body(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["details"]["healthy_targets"], 0);
}

#[tokio::test]
async fn degraded_pool_still_answers_200() {
    let mut up = mockito::Server::new_async().await;
    let mut down = mockito::Server::new_async().await;
    let _up = up.mock("GET", "/").with_status(200).create_async().await;
    let _down = down.mock("GET", "/").with_status(503).create_async().await;

    let config = test_config(vec![up.host_with_port(), down.host_with_port()]);
    let (state, monitor) = build_state(&config);
    monitor.clone().run_probe_cycle().await;

    let response = route(state, get("/health")).await;
    assert_eq!(response.status(), 200);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["details"]["healthy_targets"], 1);
}

#[tokio::test]
async fn metrics_endpoint_exposes_registry_and_process_info() {
    let mut backend = mockito::Server::new_async().await;
    let _probe = backend.mock("GET", "/").with_status(200).create_async().await;

    let config = test_config(vec![backend.host_with_port()]);
    let (state, monitor) = build_state(&config);
    monitor.clone().run_probe_cycle().await;

    let response = route(state, get("/metrics")).await;
    assert_eq!(response.status(), 200);
    let body = json_body(response).await;

    assert_eq!(body["gauges"]["healthy_targets"], 1.0);
    assert_eq!(body["gauges"]["total_targets"], 1.0);
    assert!(body["histograms"]["health_probe_duration_ms"]["count"].as_u64().unwrap() >= 1);
    assert!(body["uptime_seconds"].is_u64());
    assert_eq!(
        body["config_summary"]["targets"][0],
        backend.host_with_port()
    );
}

#[tokio::test]
async fn requests_are_proxied_to_a_healthy_backend() {
    let mut backend = mockito::Server::new_async().await;
    let _probe = backend.mock("GET", "/").with_status(200).create_async().await;
    let _echo = backend
        .mock("GET", "/echo")
        .with_status(200)
        .with_body("hello from upstream")
        .create_async()
        .await;

    let config = test_config(vec![backend.host_with_port()]);
    let (state, monitor) = build_state(&config);
    monitor.clone().run_probe_cycle().await;

    let response = route(state.clone(), get("/echo")).await;
    assert_eq!(response.status(), 200);
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&bytes[..], b"hello from upstream");

    assert_eq!(state.metrics.counter("proxy_requests_total"), 1.0);
}

#[tokio::test]
async fn proxying_with_no_healthy_target_returns_503() {
    let config = test_config(vec!["127.0.0.1:1".to_string()]);
    let (state, _monitor) = build_state(&config);

    // No probe cycle has run: the healthy set is empty.
    let response = route(state, get("/anything")).await;
    assert_eq!(response.status(), 503);
}
