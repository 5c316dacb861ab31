//! reclaim gateway entry point.
//!
//! Initialises tracing, loads configuration from environment variables
//! (prefixed with `RECLAIM_GATEWAY_`), picks a run store and serves HTTP
//! until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use reclaim_gateway::dispatcher::GithubDispatcher;
use reclaim_gateway::store::{MemoryRunStore, RunStore};
use reclaim_gateway::valkey::ValkeyRunStore;
use reclaim_gateway::{AppState, GatewayConfig, router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("reclaim-gateway starting");

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        github_repo = %format!("{}/{}", config.github_owner, config.github_repo),
        event_type = %config.event_type,
        api_key_set = config.api_key().is_some(),
        workflow_token_set = config.workflow_token().is_some(),
        callback_enabled = config.callback_token().is_some(),
        valkey = config.valkey_url.is_some(),
        "configuration loaded",
    );
    if config.api_key().is_none() || config.workflow_token().is_none() {
        tracing::warn!("API key or workflow token missing; dispatch requests will be refused");
    }

    let store = open_store(&config).await?;
    let dispatcher = GithubDispatcher::from_config(&config)?;
    let listen_addr = config.listen_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        store,
        dispatcher: Arc::new(dispatcher),
    };

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    tracing::info!("gateway ready on http://{listen_addr}/terraform");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("reclaim-gateway shut down");
    Ok(())
}

async fn open_store(config: &GatewayConfig) -> Result<Arc<dyn RunStore>> {
    let Some(url) = config.valkey_url.as_deref() else {
        tracing::info!("no Valkey URL configured, runs are kept in memory");
        return Ok(Arc::new(MemoryRunStore::new()));
    };
    // Password comes from a Docker secret file.
    let password = config
        .valkey_pass_file
        .as_deref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read password from {path}"))
                .map(|p| p.trim().to_string())
        })
        .transpose()?;
    let store = ValkeyRunStore::connect(url, config.valkey_user.as_deref(), password.as_deref())
        .await
        .context("failed to initialise Valkey connection")?;
    Ok(Arc::new(store))
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
