use std::env;

use anyhow::Context;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use quorum_backend::core;
use quorum_backend::core::config::ServerSettings;
use quorum_backend::server;
use quorum_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    core::logging::init(&state.paths);

    match state.store.count().await {
        Ok(count) => tracing::info!("Passage store connected ({} passages)", count),
        Err(err) => tracing::warn!("Failed to count passages on startup: {}", err),
    }

    let config = state.config.load_config().unwrap_or(Value::Null);
    let settings = ServerSettings::from_config(&config);
    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(settings.port);
    let bind_addr = format!("{}:{}", settings.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
}
