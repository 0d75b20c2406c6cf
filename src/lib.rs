//! Stock Watchlist
//!
//! Tracks stocks a user noticed at a given date and price, and serves
//! them grouped by symbol with current prices, change metrics, chart
//! history and reference prices from Yahoo Finance.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod providers;
pub mod services;
pub mod state;

use api::ApiServer;
use config::AppConfig;
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging, start the API server and run until Ctrl+C
pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_watchlist=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stock Watchlist...");

    let config = AppConfig::from_env()?;
    let state = Arc::new(AppState::new(config)?);
    tracing::info!("Application state initialized");

    let mut server = ApiServer::new(state);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    server.stop();
    server.wait().await;
    Ok(())
}
