// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Observer node server: wires the store client, peer discovery, the swarm
//! state poller and the HTTP API, and tears them down on Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use rlswarm_core::{
    application::SwarmCoordinator,
    domain::node_config::{MetricsConfig, SwarmNodeManifest},
    infrastructure::{detect_local_discovery, InMemorySwarmStore, StoreSeed},
    presentation::api,
};

pub async fn start_daemon(
    mut config: SwarmNodeManifest,
    port_override: Option<u16>,
    seed: Option<PathBuf>,
) -> Result<()> {
    if let Some(port) = port_override {
        config.spec.api.port = port;
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    info!(node = %config.metadata.name, "Configuration loaded");

    if config.spec.observability.metrics.enabled {
        install_metrics_exporter(&config.spec.observability.metrics)?;
    }

    // Store client
    let store = InMemorySwarmStore::connect(&config.spec.store)
        .context("Failed to connect to the swarm store")?;
    if let Some(seed_path) = seed {
        let seed = StoreSeed::from_json_file(&seed_path)
            .with_context(|| format!("Failed to read store seed {:?}", seed_path))?;
        store
            .apply_seed(seed)
            .with_context(|| format!("Invalid store seed {:?}", seed_path))?;
        info!(seed = ?seed_path, "Store seeded");
    }

    // Services
    let local = if config.spec.discovery.enable_local {
        detect_local_discovery()
    } else {
        None
    };
    let coordinator = Arc::new(SwarmCoordinator::from_config(
        &config.spec,
        Arc::new(store),
        local,
    ));
    coordinator.start().await;

    let bootstrap = coordinator.discovery().bootstrap_peers().await;
    info!(peers = ?bootstrap, "Bootstrap peers available");

    // Start HTTP server
    let addr = format!("{}:{}", config.spec.api.bind_address, config.spec.api.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            coordinator.shutdown().await;
            return Err(e).with_context(|| format!("Failed to bind to {}", addr));
        }
    };

    info!("Observer node listening on {}", addr);

    let served = axum::serve(listener, api::app(coordinator.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Observer node shutting down");
    coordinator.shutdown().await;

    served.context("HTTP server failed")
}

fn install_metrics_exporter(metrics: &MetricsConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], metrics.port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to install Prometheus exporter on {}", addr))?;
    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
