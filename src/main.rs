use std::sync::Arc;

use cissp_prep_api::{app, config, is_production, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, STRIPE_*, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(config::config().clone());
    tracing::info!("Starting CISSP Prep API in {:?} mode", config.environment);
    if is_production!() && config.security.allow_login_exchange && config.security.login_exchange_secret.is_none() {
        tracing::warn!("Login exchange is enabled in production without a shared secret");
    }

    let port = config.server.port;
    let state = AppState::from_config(config).await?;
    let router = app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("CISSP Prep API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
