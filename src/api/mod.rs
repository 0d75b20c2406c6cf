//! REST API module
//!
//! Provides:
//! - `GET    /api/stocks` - watchlist grouped by symbol, with prices
//! - `POST   /api/stocks` - track a stock
//! - `GET    /api/stocks/:id` - one stored entry
//! - `DELETE /api/stocks/:id` - remove one entry
//! - `DELETE /api/symbols/:symbol` - remove every entry for a symbol
//! - `GET    /api/history/:symbol?period=1mo|3mo|6mo|1yr` - daily closes
//! - `GET    /api/price/:symbol` - current price

mod server;
pub mod handlers;
mod types;

pub use server::{router, ApiServer};
pub use types::{AddStockRequest, HealthResponse, HistoryQuery};
