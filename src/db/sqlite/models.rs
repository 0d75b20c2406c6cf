//! SQLite database models

use serde::{Deserialize, Serialize};

/// One watchlist row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedStock {
    pub id: i64,
    pub symbol: String,
    pub date_noticed: String,
    pub price_noticed: f64,
    pub notes: String,
    pub created_at: String,
}

/// Validated input for a new watchlist row
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrackedStock {
    pub symbol: String,
    pub date_noticed: String,
    pub price_noticed: f64,
    pub notes: String,
}
