//! Application state management

use crate::cache::{CachedValue, Clock, ExpiringCache, SystemClock};
use crate::config::AppConfig;
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::providers::yahoo::YahooProvider;
use crate::providers::{MarketDataProvider, PriceAdapter};
use std::sync::Arc;

/// Application state shared across all handlers
///
/// Built once at startup and handed to the router as `Arc<AppState>`.
pub struct AppState {
    pub config: AppConfig,

    /// Watchlist store
    pub sqlite: Arc<SqliteDb>,

    /// Provider fallback chain
    pub prices: Arc<PriceAdapter>,

    /// Price and history cache shared by every request
    pub cache: Arc<ExpiringCache<CachedValue>>,
}

impl AppState {
    /// Create state backed by the configured database file and Yahoo Finance
    pub fn new(config: AppConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::info!("Database path: {:?}", config.db_path);

        let sqlite = Arc::new(SqliteDb::new(&config.db_path)?);
        let provider: Arc<dyn MarketDataProvider> = Arc::new(YahooProvider::new(&config)?);

        Ok(Self::from_parts(config, sqlite, provider, Arc::new(SystemClock)))
    }

    /// Assemble state from explicit collaborators
    pub fn from_parts(
        config: AppConfig,
        sqlite: Arc<SqliteDb>,
        provider: Arc<dyn MarketDataProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let prices = Arc::new(PriceAdapter::new(
            provider,
            config.provider_rate_limit,
            config.provider_timeout,
        ));
        let cache = Arc::new(ExpiringCache::with_clock(config.cache_ttl, clock));
        tracing::info!(
            "Price provider: {} (cache TTL {:?}, {} concurrent symbols)",
            prices.provider_id(),
            config.cache_ttl,
            config.max_concurrency
        );

        Self {
            config,
            sqlite,
            prices,
            cache,
        }
    }
}
