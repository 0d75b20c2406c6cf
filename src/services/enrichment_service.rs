//! Enrichment Service
//!
//! Turns stored watchlist rows into per-symbol groups carrying the current
//! price, a 1-month chart series, reference prices and per-entry change.
//!
//! One task is spawned per distinct symbol; a semaphore bounds how many
//! run at once. Every task returns a typed [`SymbolQuote`] and the groups
//! are assembled only after all of them have finished. A symbol whose
//! fetches fail, or whose task dies, simply keeps null price fields.

use crate::db::sqlite::TrackedStock;
use crate::providers::types::{round2, PricePoint};
use crate::services::history_service::{ChartPeriod, HistoryService};
use crate::services::quotes_service::QuotesService;
use crate::state::AppState;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Watchlist row plus derived price change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEntry {
    pub id: i64,
    pub date_noticed: String,
    pub price_noticed: f64,
    pub notes: String,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
}

/// All entries for one symbol, sharing a single current price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolGroup {
    pub symbol: String,
    pub entries: Vec<EnrichedEntry>,
    pub current_price: Option<f64>,
    pub chart_data: Vec<PricePoint>,
    pub reference_prices: BTreeMap<String, f64>,
}

impl SymbolGroup {
    /// Most recent notice date among the entries
    fn latest_noticed(&self) -> Option<&str> {
        self.entries.iter().map(|e| e.date_noticed.as_str()).max()
    }
}

/// Market data fetched for one symbol
#[derive(Debug, Clone)]
struct SymbolQuote {
    symbol: String,
    current_price: Option<f64>,
    chart: Arc<Vec<PricePoint>>,
    references: BTreeMap<String, f64>,
}

/// Enrichment service for business logic
pub struct EnrichmentService;

impl EnrichmentService {
    /// Group, price and sort a snapshot of watchlist rows
    ///
    /// Never fails: missing market data only nulls the affected fields.
    pub async fn enrich(state: &Arc<AppState>, stocks: &[TrackedStock]) -> Vec<SymbolGroup> {
        let mut groups = group_by_symbol(stocks);
        if groups.is_empty() {
            return groups;
        }

        let today = Utc::now().date_naive();
        let symbols: Vec<String> = groups.iter().map(|g| g.symbol.clone()).collect();
        info!(
            "EnrichmentService::enrich - {} entries, {} symbols",
            stocks.len(),
            symbols.len()
        );

        let quotes = Self::fetch_all(state, symbols, today).await;

        for group in groups.iter_mut() {
            let Some(quote) = quotes.get(&group.symbol) else {
                continue;
            };
            group.current_price = quote.current_price;
            group.chart_data = quote.chart.as_ref().clone();
            group.reference_prices = quote.references.clone();

            if let Some(current) = quote.current_price {
                for entry in group.entries.iter_mut() {
                    if let Some((change, percent)) = price_change(entry.price_noticed, current) {
                        entry.change = Some(change);
                        entry.change_percent = Some(percent);
                    }
                }
            }
        }

        // Stable, so equal dates keep store order
        groups.sort_by(|a, b| b.latest_noticed().cmp(&a.latest_noticed()));
        groups
    }

    /// Fan out one task per symbol, bounded by `max_concurrency`, and join all
    async fn fetch_all(
        state: &Arc<AppState>,
        symbols: Vec<String>,
        today: NaiveDate,
    ) -> HashMap<String, SymbolQuote> {
        let permits = Arc::new(Semaphore::new(state.config.max_concurrency));
        let mut tasks = JoinSet::new();

        for symbol in symbols {
            let state = state.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                Self::fetch_symbol(&state, symbol, today).await
            });
        }

        let mut quotes = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(quote) => {
                    quotes.insert(quote.symbol.clone(), quote);
                }
                Err(e) => error!("Symbol fetch task failed: {}", e),
            }
        }
        quotes
    }

    async fn fetch_symbol(state: &AppState, symbol: String, today: NaiveDate) -> SymbolQuote {
        let (current_price, chart, references) = tokio::join!(
            QuotesService::cached_current_price(state, &symbol),
            HistoryService::chart_history(state, &symbol, ChartPeriod::OneMonth, today),
            HistoryService::reference_prices(state, &symbol, today),
        );
        debug!("{} resolved, current price {:?}", symbol, current_price);

        SymbolQuote {
            symbol,
            current_price,
            chart,
            references,
        }
    }
}

/// Group rows by symbol in first-seen order, price fields unset
fn group_by_symbol(stocks: &[TrackedStock]) -> Vec<SymbolGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<SymbolGroup> = Vec::new();

    for stock in stocks {
        let slot = *index.entry(stock.symbol.as_str()).or_insert_with(|| {
            groups.push(SymbolGroup {
                symbol: stock.symbol.clone(),
                entries: Vec::new(),
                current_price: None,
                chart_data: Vec::new(),
                reference_prices: BTreeMap::new(),
            });
            groups.len() - 1
        });

        groups[slot].entries.push(EnrichedEntry {
            id: stock.id,
            date_noticed: stock.date_noticed.clone(),
            price_noticed: stock.price_noticed,
            notes: stock.notes.clone(),
            change: None,
            change_percent: None,
        });
    }

    groups
}

/// `(change, change_percent)` of `current` against `noticed`, both to cents
pub fn price_change(noticed: f64, current: f64) -> Option<(f64, f64)> {
    if !(noticed.is_finite() && noticed > 0.0 && current.is_finite()) {
        return None;
    }
    let change = current - noticed;
    Some((round2(change), round2(change / noticed * 100.0)))
}
