//! Node startup

use crate::api::{self, AppState};
use crate::config::{NodeConfig, ServerConfig};
use crate::metrics::Metrics;
use axum::http::HeaderValue;
use axum::Router;
use stakeline_core::SystemClock;
use stakeline_ledger::Ledger;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Open storage and assemble the ledger and router
pub fn build(config: &NodeConfig) -> anyhow::Result<Router> {
    let store = stakeline_storage::open(&config.storage.backend())?;
    let ledger = Ledger::new(store, Arc::new(SystemClock), config.ledger.clone());
    let metrics = Arc::new(Metrics::new()?);
    let state = AppState::new(ledger, metrics, config.metrics.enabled);

    Ok(api::router(state).layer(cors_layer(&config.server)?))
}

fn cors_layer(server: &ServerConfig) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.cors_origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }
    let origins = server
        .cors_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(layer.allow_origin(origins))
}

/// Serve the API until Ctrl-C
pub async fn serve(config: NodeConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config.server.listen_addr.parse()?;
    let app = build(&config)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Stakeline API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stakeline API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
