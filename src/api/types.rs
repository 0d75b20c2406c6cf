//! REST API types
//!
//! Request and response bodies that belong to the HTTP surface only;
//! service results are serialized as-is.

use serde::{Deserialize, Serialize};

pub use crate::services::AddStockRequest;

/// Health check body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Stock Watchlist API is running".to_string(),
        }
    }
}

/// Query string of `GET /api/history/:symbol`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub period: Option<String>,
}
