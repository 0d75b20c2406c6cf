//! Quotes Service
//!
//! Current price per symbol, cache first, provider on miss.

use crate::cache::{price_key, CachedValue};
use crate::error::{AppError, Result};
use crate::providers::types::ProviderOutcome;
use crate::services::watchlist_service::normalize_symbol;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of a single price lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResult {
    pub symbol: String,
    pub price: f64,
}

/// Quotes service for business logic
pub struct QuotesService;

impl QuotesService {
    /// Current price for an already normalized symbol
    ///
    /// Successful lookups are cached for the configured TTL. A definitive
    /// "no data" answer is cached only when negative caching is enabled;
    /// transient failures are never cached.
    pub async fn cached_current_price(state: &AppState, symbol: &str) -> Option<f64> {
        let key = price_key(symbol);

        match state.cache.get(&key) {
            Some(CachedValue::Price(price)) => {
                debug!("Cache hit: {}", key);
                return Some(price);
            }
            Some(CachedValue::Missing) => {
                debug!("Negative cache hit: {}", key);
                return None;
            }
            _ => debug!("Cache miss: {}", key),
        }

        match state.prices.current_price(symbol).await {
            ProviderOutcome::Value(price) => {
                state.cache.set(key, CachedValue::Price(price));
                Some(price)
            }
            ProviderOutcome::NoData => {
                info!("No price data for {}", symbol);
                state.cache.set_with_ttl(
                    key,
                    CachedValue::Missing,
                    state.config.negative_cache_ttl,
                );
                None
            }
            ProviderOutcome::Transient(reason) => {
                warn!("Price unavailable for {}: {}", symbol, reason);
                None
            }
        }
    }

    /// Price lookup for the API; `NotFound` when the provider has nothing
    pub async fn get_price(state: &AppState, symbol: &str) -> Result<PriceResult> {
        let not_found =
            || AppError::NotFound("Could not fetch price. Check the symbol and try again.".to_string());

        // No provider knows a symbol outside the ticker charset
        let symbol = normalize_symbol(symbol).map_err(|_| not_found())?;
        info!("QuotesService::get_price - {}", symbol);

        let price = Self::cached_current_price(state, &symbol)
            .await
            .ok_or_else(not_found)?;

        Ok(PriceResult { symbol, price })
    }
}
