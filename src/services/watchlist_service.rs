//! Watchlist Service
//!
//! Validation and persistence for tracked stocks, and the enriched
//! listing served to the UI.

use crate::db::sqlite::{NewTrackedStock, TrackedStock};
use crate::error::{AppError, Result};
use crate::services::enrichment_service::{EnrichmentService, SymbolGroup};
use crate::state::AppState;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Body of `POST /api/stocks`
///
/// Every field is optional at the wire level so missing fields can be
/// reported as a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddStockRequest {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub date_noticed: Option<String>,
    /// Number or numeric string
    #[serde(default)]
    pub price_noticed: Option<serde_json::Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddStockResult {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSymbolResult {
    pub message: String,
    pub deleted: usize,
}

/// Date layouts accepted for `date_noticed`
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%d %b %Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Watchlist service for business logic
pub struct WatchlistService;

impl WatchlistService {
    /// Validate and store a new tracked stock
    pub fn add_stock(state: &AppState, request: AddStockRequest) -> Result<AddStockResult> {
        let stock = validate_new_stock(request)?;
        let id = state.sqlite.add_stock(&stock)?;

        info!(
            "Tracking {} noticed {} at {} (id {})",
            stock.symbol, stock.date_noticed, stock.price_noticed, id
        );

        Ok(AddStockResult {
            id,
            message: "Stock added successfully".to_string(),
        })
    }

    /// Every stored row, grouped by symbol and enriched with prices
    pub async fn list_enriched(state: &Arc<AppState>) -> Result<Vec<SymbolGroup>> {
        let stocks = state.sqlite.get_all_stocks()?;
        Ok(EnrichmentService::enrich(state, &stocks).await)
    }

    pub fn get_stock(state: &AppState, id: i64) -> Result<TrackedStock> {
        state
            .sqlite
            .get_stock(id)?
            .ok_or_else(|| AppError::NotFound("Stock not found".to_string()))
    }

    pub fn delete_stock(state: &AppState, id: i64) -> Result<DeleteResult> {
        if !state.sqlite.delete_stock(id)? {
            return Err(AppError::NotFound("Stock not found".to_string()));
        }
        info!("Deleted tracked stock {}", id);

        Ok(DeleteResult {
            message: "Stock deleted successfully".to_string(),
        })
    }

    /// Remove every entry for a symbol
    pub fn delete_symbol(state: &AppState, symbol: &str) -> Result<DeleteSymbolResult> {
        let symbol = normalize_symbol(symbol)?;
        let deleted = state.sqlite.delete_stocks_by_symbol(&symbol)?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("No entries for {}", symbol)));
        }
        info!("Deleted {} entries for {}", deleted, symbol);

        Ok(DeleteSymbolResult {
            message: format!("Deleted all entries for {}", symbol),
            deleted,
        })
    }
}

fn validate_new_stock(request: AddStockRequest) -> Result<NewTrackedStock> {
    let symbol = request.symbol.unwrap_or_default();
    let date_noticed = request.date_noticed.unwrap_or_default();
    let price_noticed = request
        .price_noticed
        .filter(|value| !value.is_null());

    let price_noticed = match price_noticed {
        Some(price) if !symbol.trim().is_empty() && !date_noticed.trim().is_empty() => price,
        _ => return Err(AppError::Validation("Missing required fields".to_string())),
    };

    Ok(NewTrackedStock {
        symbol: normalize_symbol(&symbol)?,
        date_noticed: parse_date_noticed(&date_noticed)?,
        price_noticed: parse_price(&price_noticed)?,
        notes: request.notes.unwrap_or_default(),
    })
}

fn invalid(reason: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Invalid data: {}", reason))
}

/// Trim and upper-case a ticker, rejecting characters no ticker uses
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(invalid("symbol is empty"));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        return Err(invalid(format!("unsupported characters in symbol '{}'", symbol)));
    }
    Ok(symbol)
}

/// Parse a notice date in any accepted layout, returned as `YYYY-MM-DD`
pub fn parse_date_noticed(raw: &str) -> Result<String> {
    let raw = raw.trim();

    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| invalid(format!("could not parse date '{}'", raw)))?;

    Ok(date.format("%Y-%m-%d").to_string())
}

/// Accept a JSON number or numeric string; must be finite and positive
pub fn parse_price(value: &serde_json::Value) -> Result<f64> {
    let price = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid(format!("price_noticed must be a number, got {}", value)))?;

    if !price.is_finite() || price <= 0.0 {
        return Err(invalid("price_noticed must be greater than zero"));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;
    use crate::state::testing::test_state;
    use serde_json::json;

    fn request(body: serde_json::Value) -> AddStockRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" brk.b ").unwrap(), "BRK.B");
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
        assert!(normalize_symbol("   ").is_err());
        assert!(normalize_symbol("AAPL/../x").is_err());
    }

    #[test]
    fn test_parse_date_layouts() {
        assert_eq!(parse_date_noticed("2024-03-01").unwrap(), "2024-03-01");
        assert_eq!(parse_date_noticed("03/01/2024").unwrap(), "2024-03-01");
        assert_eq!(parse_date_noticed("2024/03/01").unwrap(), "2024-03-01");
        assert_eq!(parse_date_noticed("Mar 01, 2024").unwrap(), "2024-03-01");
        assert_eq!(parse_date_noticed("2024-03-01T09:30:00Z").unwrap(), "2024-03-01");
        assert_eq!(parse_date_noticed("2024-03-01 09:30:00").unwrap(), "2024-03-01");
        assert!(parse_date_noticed("yesterday").is_err());
        assert!(parse_date_noticed("2024-02-30").is_err());
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price(&json!(101.5)).unwrap(), 101.5);
        assert_eq!(parse_price(&json!("101.5")).unwrap(), 101.5);
        assert_eq!(parse_price(&json!(7)).unwrap(), 7.0);
        assert!(parse_price(&json!("not-a-number")).is_err());
        assert!(parse_price(&json!(0)).is_err());
        assert!(parse_price(&json!("-3")).is_err());
        assert!(parse_price(&json!("NaN")).is_err());
        assert!(parse_price(&json!(true)).is_err());
    }

    #[test]
    fn test_missing_fields() {
        for body in [
            json!({}),
            json!({"symbol": "", "date_noticed": "2024-01-01", "price_noticed": 1}),
            json!({"symbol": "AAPL", "price_noticed": 1}),
            json!({"symbol": "AAPL", "date_noticed": "2024-01-01", "price_noticed": null}),
        ] {
            let err = validate_new_stock(request(body)).unwrap_err();
            assert_eq!(err.message(), "Missing required fields");
        }
    }

    #[test]
    fn test_add_stock_stores_normalized_row() {
        let t = test_state(MockProvider::new());
        let result = WatchlistService::add_stock(
            &t.state,
            request(json!({
                "symbol": "msft",
                "date_noticed": "02/01/2024",
                "price_noticed": "404.06",
                "notes": "cloud growth"
            })),
        )
        .unwrap();
        assert_eq!(result.message, "Stock added successfully");

        let row = WatchlistService::get_stock(&t.state, result.id).unwrap();
        assert_eq!(row.symbol, "MSFT");
        assert_eq!(row.date_noticed, "2024-02-01");
        assert_eq!(row.price_noticed, 404.06);
        assert_eq!(row.notes, "cloud growth");
    }

    #[test]
    fn test_invalid_price_rejected() {
        let t = test_state(MockProvider::new());
        let err = WatchlistService::add_stock(
            &t.state,
            request(json!({
                "symbol": "AAPL",
                "date_noticed": "2024-01-01",
                "price_noticed": "not-a-number"
            })),
        )
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(t.state.sqlite.get_all_stocks().unwrap().is_empty());
    }

    #[test]
    fn test_delete_twice() {
        let t = test_state(MockProvider::new());
        let added = WatchlistService::add_stock(
            &t.state,
            request(json!({"symbol": "AAPL", "date_noticed": "2024-01-01", "price_noticed": 1})),
        )
        .unwrap();

        assert!(WatchlistService::delete_stock(&t.state, added.id).is_ok());
        assert!(matches!(
            WatchlistService::delete_stock(&t.state, added.id),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            WatchlistService::delete_stock(&t.state, 4242),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            WatchlistService::delete_stock(&t.state, 4242),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_symbol() {
        let t = test_state(MockProvider::new());
        for date in ["2024-01-01", "2024-02-01"] {
            WatchlistService::add_stock(
                &t.state,
                request(json!({"symbol": "AAPL", "date_noticed": date, "price_noticed": 1})),
            )
            .unwrap();
        }

        let result = WatchlistService::delete_symbol(&t.state, "aapl").unwrap();
        assert_eq!(result.deleted, 2);
        assert!(matches!(
            WatchlistService::delete_symbol(&t.state, "AAPL"),
            Err(AppError::NotFound(_))
        ));
    }
}
