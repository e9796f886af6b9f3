// src/main.rs
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use waypoint::circuit_breaker::SystemClock;
use waypoint::config;
use waypoint::health::HealthMonitor;
use waypoint::metrics::MetricsRegistry;
use waypoint::proxy::Proxy;
use waypoint::selector::TargetSelector;
use waypoint::server::{AppState, RequestHandler, ServerBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("waypoint=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    let metrics = Arc::new(MetricsRegistry::new());

    let monitor = Arc::new(HealthMonitor::new(
        config.health_check.clone(),
        config.targets.clone(),
        config.circuit_breaker.clone(),
        Arc::new(SystemClock),
        metrics.clone(),
    )?);

    tokio::spawn(monitor.clone().start());

    let proxy = Proxy::new(TargetSelector::new(monitor.clone()), metrics.clone());

    let state = Arc::new(AppState {
        proxy,
        monitor: monitor.clone(),
        metrics,
        config_summary: config.summary(),
        started_at: std::time::Instant::now(),
    });

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Starting load balancer on {}", addr);

    let server = ServerBuilder::new(addr, RequestHandler::new(state));

    tokio::select! {
        result = server.serve() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {}
    }

    monitor.stop();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
