//! HTTP server for the watchlist REST API

use crate::api::handlers;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    routing::{delete, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router with all routes
pub fn router(state: Arc<AppState>) -> Router {
    // The UI is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::health_check))
        .route(
            "/api/stocks",
            get(handlers::list_stocks).post(handlers::add_stock),
        )
        .route(
            "/api/stocks/:id",
            get(handlers::get_stock).delete(handlers::delete_stock),
        )
        .route("/api/symbols/:symbol", delete(handlers::delete_symbol))
        .route("/api/history/:symbol", get(handlers::get_history))
        .route("/api/price/:symbol", get(handlers::get_price))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server manager
pub struct ApiServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Bind and start serving in the background; returns the bound address
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let bind_addr = self.state.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind to {}: {}", bind_addr, e)))?;
        let addr = listener.local_addr()?;

        let app = router(self.state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting Stock Watchlist API server on {}", addr);

        self.task = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        }));

        info!("=== Endpoints ===");
        info!("  GET    http://{}/api/stocks", addr);
        info!("  POST   http://{}/api/stocks", addr);
        info!("  GET    http://{}/api/stocks/{{id}}", addr);
        info!("  DELETE http://{}/api/stocks/{{id}}", addr);
        info!("  DELETE http://{}/api/symbols/{{symbol}}", addr);
        info!("  GET    http://{}/api/history/{{symbol}}?period=1mo|3mo|6mo|1yr", addr);
        info!("  GET    http://{}/api/price/{{symbol}}", addr);

        Ok(addr)
    }

    /// Stop the server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
    }

    /// Wait for the serving task to finish
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("API server task failed: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}
