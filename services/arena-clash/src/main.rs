use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use arena_clash::instructions::bootstrap_admin;
use arena_clash::{api_router, webhook_router, AppState, DocStore, ServiceConfig, ZapUpiClient};
use arena_store::{Backend, MemoryBackend, Store};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServiceConfig::from_env().context("loading configuration")?;
    tracing::info!(?config, "starting arena-clash");

    let gateway = ZapUpiClient::new(config.gateway.clone()).context("building gateway client")?;
    let store: DocStore = Store::new(Box::new(MemoryBackend::new()) as Box<dyn Backend>);
    if let Some(uid) = &config.bootstrap_admin {
        bootstrap_admin(&store, uid).context("promoting bootstrap admin")?;
    }
    let state = AppState::new(store, Arc::new(gateway), config.webhook_secret.clone());

    let api = TcpListener::bind(config.api_addr)
        .await
        .with_context(|| format!("binding API listener on {}", config.api_addr))?;
    let hooks = TcpListener::bind(config.webhook_addr)
        .await
        .with_context(|| format!("binding webhook listener on {}", config.webhook_addr))?;
    tracing::info!(api = %config.api_addr, webhook = %config.webhook_addr, "listening");

    tokio::try_join!(
        axum::serve(api, api_router(state.clone()))
            .with_graceful_shutdown(shutdown_signal())
            .into_future(),
        axum::serve(hooks, webhook_router(state))
            .with_graceful_shutdown(shutdown_signal())
            .into_future(),
    )
    .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
