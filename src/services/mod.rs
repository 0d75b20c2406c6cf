//! Services Layer
//!
//! Business logic called by the REST API handlers.
//!
//! # Architecture
//!
//! ```text
//! HTTP handlers --> Services --> Watchlist store (SQLite)
//!                           \--> Price cache --> Price adapter --> Provider
//! ```
//!
//! # Services
//!
//! - `WatchlistService` - Add, list, delete tracked stocks
//! - `QuotesService` - Current price per symbol
//! - `HistoryService` - Daily close series and reference prices
//! - `EnrichmentService` - Per-symbol fan-out and change metrics

pub mod watchlist_service;
pub mod quotes_service;
pub mod history_service;
pub mod enrichment_service;

pub use watchlist_service::{
    AddStockRequest, AddStockResult, DeleteResult, DeleteSymbolResult, WatchlistService,
};
pub use quotes_service::{PriceResult, QuotesService};
pub use history_service::{ChartPeriod, HistoryResult, HistoryService, ReferencePeriod};
pub use enrichment_service::{EnrichedEntry, EnrichmentService, SymbolGroup};
