//! History Service
//!
//! Daily close series for charts, and reference prices derived from them.
//! Series are cached under `history:<SYMBOL>:<PERIOD>`.

use crate::cache::{history_key, CachedValue};
use crate::error::Result;
use crate::providers::types::{PricePoint, ProviderOutcome};
use crate::services::watchlist_service::normalize_symbol;
use crate::state::AppState;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Chart windows offered by the history endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartPeriod {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1yr")]
    OneYear,
}

impl ChartPeriod {
    pub const DEFAULT: ChartPeriod = ChartPeriod::ThreeMonths;

    /// Parse a query value; anything unrecognized falls back to 3 months
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1mo") => ChartPeriod::OneMonth,
            Some("3mo") => ChartPeriod::ThreeMonths,
            Some("6mo") => ChartPeriod::SixMonths,
            Some("1yr") => ChartPeriod::OneYear,
            _ => Self::DEFAULT,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartPeriod::OneMonth => "1mo",
            ChartPeriod::ThreeMonths => "3mo",
            ChartPeriod::SixMonths => "6mo",
            ChartPeriod::OneYear => "1yr",
        }
    }

    /// Calendar days covered by the window
    pub fn days(&self) -> i64 {
        match self {
            ChartPeriod::OneMonth => 31,
            ChartPeriod::ThreeMonths => 92,
            ChartPeriod::SixMonths => 183,
            ChartPeriod::OneYear => 365,
        }
    }
}

/// Lookbacks reported as reference prices on enriched groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePeriod {
    OneDay,
    OneWeek,
    OneMonth,
    ThreeMonths,
}

impl ReferencePeriod {
    pub const ALL: [ReferencePeriod; 4] = [
        ReferencePeriod::OneDay,
        ReferencePeriod::OneWeek,
        ReferencePeriod::OneMonth,
        ReferencePeriod::ThreeMonths,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReferencePeriod::OneDay => "1d",
            ReferencePeriod::OneWeek => "1wk",
            ReferencePeriod::OneMonth => "1mo",
            ReferencePeriod::ThreeMonths => "3mo",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            ReferencePeriod::OneDay => 1,
            ReferencePeriod::OneWeek => 7,
            ReferencePeriod::OneMonth => 31,
            ReferencePeriod::ThreeMonths => 92,
        }
    }
}

/// Days of history behind the reference prices: the longest lookback
/// plus a week so the boundary always has an earlier trading day
pub const REFERENCE_WINDOW_DAYS: i64 = 92 + 7;

const REFERENCE_SERIES: &str = "ref";

/// History result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResult {
    pub symbol: String,
    pub period: ChartPeriod,
    pub data: Vec<PricePoint>,
}

/// History service for business logic
pub struct HistoryService;

impl HistoryService {
    /// Daily closes for the history endpoint
    pub async fn get_history(
        state: &AppState,
        symbol: &str,
        period: Option<&str>,
    ) -> Result<HistoryResult> {
        let period = ChartPeriod::parse_or_default(period);
        let symbol = match normalize_symbol(symbol) {
            Ok(symbol) => symbol,
            Err(e) => {
                debug!("No history for unsupported symbol: {}", e);
                return Ok(HistoryResult {
                    symbol: symbol.trim().to_uppercase(),
                    period,
                    data: Vec::new(),
                });
            }
        };
        info!("HistoryService::get_history - {} {}", symbol, period.label());

        let today = Utc::now().date_naive();
        let data = Self::chart_history(state, &symbol, period, today).await;

        Ok(HistoryResult {
            symbol,
            period,
            data: data.as_ref().clone(),
        })
    }

    /// Daily closes for a chart window ending today
    pub async fn chart_history(
        state: &AppState,
        symbol: &str,
        period: ChartPeriod,
        today: NaiveDate,
    ) -> Arc<Vec<PricePoint>> {
        let start = today - Duration::days(period.days());
        Self::cached_history(state, symbol, period.label(), start, today).await
    }

    /// Latest close at or before each reference boundary
    pub async fn reference_prices(
        state: &AppState,
        symbol: &str,
        today: NaiveDate,
    ) -> BTreeMap<String, f64> {
        let start = today - Duration::days(REFERENCE_WINDOW_DAYS);
        let series = Self::cached_history(state, symbol, REFERENCE_SERIES, start, today).await;
        select_reference_prices(&series, today)
    }

    /// Series for `[start, end]` under `history:<symbol>:<label>`
    async fn cached_history(
        state: &AppState,
        symbol: &str,
        label: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Arc<Vec<PricePoint>> {
        let key = history_key(symbol, label);

        match state.cache.get(&key) {
            Some(CachedValue::History(series)) => {
                debug!("Cache hit: {}", key);
                return series;
            }
            Some(CachedValue::Missing) => {
                debug!("Negative cache hit: {}", key);
                return Arc::new(Vec::new());
            }
            _ => debug!("Cache miss: {}", key),
        }

        match state.prices.daily_history(symbol, start, end).await {
            ProviderOutcome::Value(series) => {
                let series = Arc::new(series);
                state.cache.set(key, CachedValue::History(series.clone()));
                series
            }
            ProviderOutcome::NoData => {
                info!("No history for {} ({})", symbol, label);
                state.cache.set_with_ttl(
                    key,
                    CachedValue::Missing,
                    state.config.negative_cache_ttl,
                );
                Arc::new(Vec::new())
            }
            ProviderOutcome::Transient(reason) => {
                warn!("History unavailable for {} ({}): {}", symbol, label, reason);
                Arc::new(Vec::new())
            }
        }
    }
}

/// Reference price per period: the latest close dated at or before
/// `today - period.days()`. Periods with no such close are omitted.
pub fn select_reference_prices(series: &[PricePoint], today: NaiveDate) -> BTreeMap<String, f64> {
    ReferencePeriod::ALL
        .iter()
        .filter_map(|period| {
            let boundary = (today - Duration::days(period.days()))
                .format("%Y-%m-%d")
                .to_string();
            series
                .iter()
                .filter(|point| point.date <= boundary)
                .max_by(|a, b| a.date.cmp(&b.date))
                .map(|point| (period.label().to_string(), point.price))
        })
        .collect()
}
