//! Market data provider adapters
//!
//! `MarketDataProvider` models the raw surfaces of an external quote
//! source. `PriceAdapter` sits in front of it and owns the fallback
//! chain, per-call timeout and outbound throttle; it never returns an
//! error, only a [`ProviderOutcome`].

pub mod types;
pub mod throttle;
pub mod yahoo;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use throttle::ProviderThrottle;
use tracing::{debug, warn};
use types::*;

/// Info-surface fields tried in order when the fast quote has no price
pub const INFO_PRICE_FIELDS: [&str; 3] = ["currentPrice", "regularMarketPrice", "previousClose"];

/// Calendar days of history used as the last-resort price source
pub const FALLBACK_HISTORY_DAYS: i64 = 5;

/// Raw surfaces of an external market data source
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider ID (e.g., "yahoo")
    fn id(&self) -> &'static str;

    /// Lightweight last-traded price
    async fn fast_quote(&self, symbol: &str) -> Result<Option<f64>>;

    /// General quote info as numeric fields by name
    async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo>;

    /// Daily closes between `start` and `end` inclusive
    async fn daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>>;
}

/// Fallback chain, timeout and throttle in front of a provider
pub struct PriceAdapter {
    provider: Arc<dyn MarketDataProvider>,
    throttle: ProviderThrottle,
    timeout: Duration,
}

impl PriceAdapter {
    pub fn new(provider: Arc<dyn MarketDataProvider>, rate_limit: u32, timeout: Duration) -> Self {
        Self {
            provider,
            throttle: ProviderThrottle::new(rate_limit),
            timeout,
        }
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    /// Latest price for `symbol`, trying cheaper surfaces first
    ///
    /// 1. fast quote
    /// 2. info surface, fields in [`INFO_PRICE_FIELDS`] order
    /// 3. most recent close of the last few days
    pub async fn current_price(&self, symbol: &str) -> ProviderOutcome<f64> {
        let mut last_error: Option<String> = None;

        match self
            .call("fast_quote", symbol, self.provider.fast_quote(symbol))
            .await
        {
            Ok(Some(price)) if is_valid_price(price) => {
                return ProviderOutcome::Value(round2(price))
            }
            Ok(_) => debug!("{}: fast quote has no usable price", symbol),
            Err(e) => last_error = Some(e.to_string()),
        }

        match self
            .call("quote_info", symbol, self.provider.quote_info(symbol))
            .await
        {
            Ok(info) => {
                let price = INFO_PRICE_FIELDS
                    .iter()
                    .filter_map(|field| info.get(*field).copied())
                    .find(|price| is_valid_price(*price));
                if let Some(price) = price {
                    return ProviderOutcome::Value(round2(price));
                }
                debug!("{}: info surface has no usable price", symbol);
            }
            Err(e) => last_error = Some(e.to_string()),
        }

        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(FALLBACK_HISTORY_DAYS);
        match self
            .call(
                "daily_bars",
                symbol,
                self.provider.daily_bars(symbol, start, end),
            )
            .await
        {
            Ok(bars) => {
                if let Some(last) = latest_bar(&bars) {
                    if is_valid_price(last.price) {
                        return ProviderOutcome::Value(round2(last.price));
                    }
                }
                debug!("{}: no recent daily bars", symbol);
            }
            Err(e) => last_error = Some(e.to_string()),
        }

        match last_error {
            Some(reason) => ProviderOutcome::Transient(reason),
            None => ProviderOutcome::NoData,
        }
    }

    /// Daily closes over `[start, end]`, ascending by date
    pub async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderOutcome<Vec<PricePoint>> {
        match self
            .call(
                "daily_bars",
                symbol,
                self.provider.daily_bars(symbol, start, end),
            )
            .await
        {
            Ok(mut bars) => {
                bars.retain(|bar| is_valid_price(bar.price));
                if bars.is_empty() {
                    return ProviderOutcome::NoData;
                }
                bars.sort_by(|a, b| a.date.cmp(&b.date));
                bars.dedup_by(|later, earlier| later.date == earlier.date);
                for bar in bars.iter_mut() {
                    bar.price = round2(bar.price);
                }
                ProviderOutcome::Value(bars)
            }
            Err(e) => ProviderOutcome::Transient(e.to_string()),
        }
    }

    /// Throttle, time-box and log one provider call
    async fn call<T, F>(&self, surface: &str, symbol: &str, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.throttle.acquire().await;

        let result = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Provider(format!(
                "{} timed out after {:?}",
                surface, self.timeout
            ))),
        };

        if let Err(e) = &result {
            warn!(
                "{} {} failed for {}: {}",
                self.provider.id(),
                surface,
                symbol,
                e
            );
        }
        result
    }
}

fn latest_bar(bars: &[PricePoint]) -> Option<&PricePoint> {
    bars.iter().max_by(|a, b| a.date.cmp(&b.date))
}

#[cfg(test)]
pub mod mock {
    //! Scripted provider for tests

    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Per-symbol scripted responses; unknown symbols fail every surface
    #[derive(Debug, Clone, Default)]
    pub struct Script {
        pub fast: Option<f64>,
        pub info: QuoteInfo,
        pub bars: Vec<PricePoint>,
        /// Every surface errors
        pub fail: bool,
        /// Every surface sleeps this long before answering
        pub delay: Option<Duration>,
    }

    impl Script {
        pub fn fast(price: f64) -> Self {
            Self {
                fast: Some(price),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn with_bars(mut self, bars: &[(&str, f64)]) -> Self {
            self.bars = bars
                .iter()
                .map(|(date, price)| PricePoint {
                    date: date.to_string(),
                    price: *price,
                })
                .collect();
            self
        }
    }

    #[derive(Default)]
    pub struct MockProvider {
        scripts: DashMap<String, Script>,
        pub fast_calls: AtomicUsize,
        pub info_calls: AtomicUsize,
        pub bar_calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(self, symbol: &str, script: Script) -> Self {
            self.scripts.insert(symbol.to_string(), script);
            self
        }

        pub fn set_script(&self, symbol: &str, script: Script) {
            self.scripts.insert(symbol.to_string(), script);
        }

        pub fn total_calls(&self) -> usize {
            self.fast_calls.load(Ordering::SeqCst)
                + self.info_calls.load(Ordering::SeqCst)
                + self.bar_calls.load(Ordering::SeqCst)
        }

        async fn lookup(&self, symbol: &str) -> Result<Script> {
            let script = self
                .scripts
                .get(symbol)
                .map(|s| s.clone())
                .ok_or_else(|| AppError::Provider(format!("unknown symbol {}", symbol)))?;
            if let Some(delay) = script.delay {
                tokio::time::sleep(delay).await;
            }
            if script.fail {
                return Err(AppError::Provider(format!("scripted failure for {}", symbol)));
            }
            Ok(script)
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> &'static str {
            "mock"
        }

        async fn fast_quote(&self, symbol: &str) -> Result<Option<f64>> {
            self.fast_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.lookup(symbol).await?.fast)
        }

        async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.lookup(symbol).await?.info)
        }

        async fn daily_bars(
            &self,
            symbol: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PricePoint>> {
            self.bar_calls.fetch_add(1, Ordering::SeqCst);
            let start = start.format("%Y-%m-%d").to_string();
            let end = end.format("%Y-%m-%d").to_string();
            Ok(self
                .lookup(symbol)
                .await?
                .bars
                .into_iter()
                .filter(|bar| bar.date >= start && bar.date <= end)
                .collect())
        }
    }
}
