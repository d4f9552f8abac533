use std::sync::Arc;

use anyhow::{Context, Result};
use common::auth::{Credentials, OAuthConfig};
use common::photos::GooglePhotosClient;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

mod config;
mod download_cache;
mod error;
mod metadata_cache;
mod routes;
mod snapshot;
mod state;
mod store;

#[cfg(test)]
mod testing;

use crate::{config::FeederConfig, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .init();

    info!("Starting photo feeder service");

    let config = FeederConfig::from_env()?;
    let credentials = credentials(&config)?;
    let client = Arc::new(GooglePhotosClient::new(config.photos(), credentials)?);

    let cancel = CancellationToken::new();

    // Start the caches
    let metadata =
        metadata_cache::initialize(client.clone(), config.metadata(), &cancel).await?;
    let downloads =
        download_cache::initialize(client, metadata.cache(), config.download(), &cancel);

    let app_state = AppState {
        metadata: metadata.cache(),
        downloads: downloads.queue(),
        cancel: cancel.clone(),
        reload_secs: config.reload_secs,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("Feeder listening on {}", config.listen_addr);

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutting down photo feeder service");
        shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    cancel.cancel();
    downloads.join().await;
    metadata.join().await;

    info!("Photo feeder service stopped");
    Ok(())
}

/// Pick a fixed access token if configured, else the refresh-token grant
fn credentials(config: &FeederConfig) -> Result<Credentials> {
    if let Some(token) = &config.access_token {
        return Ok(Credentials::from_access_token(token.clone()));
    }

    let client_id = config
        .client_id
        .clone()
        .context("FEEDER_CLIENT_ID is required")?;
    let client_secret = config
        .client_secret
        .clone()
        .context("FEEDER_CLIENT_SECRET is required")?;
    let refresh_token = config
        .refresh_token
        .clone()
        .context("FEEDER_REFRESH_TOKEN is required")?;

    Ok(Credentials::refreshing(OAuthConfig::google(
        client_id,
        client_secret,
        refresh_token,
    ))?)
}
