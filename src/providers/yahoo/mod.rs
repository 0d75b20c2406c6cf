//! Yahoo Finance market data adapter
//!
//! Uses the public chart endpoint for the fast quote and daily bars, and
//! the quoteSummary endpoint as the general info surface.

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::providers::types::{PricePoint, QuoteInfo};
use crate::providers::MarketDataProvider;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";
const SUMMARY_MODULES: &str = "financialData,price,summaryDetail";

/// Yahoo Finance provider implementation
pub struct YahooProvider {
    client: Client,
    chart_url: String,
    summary_url: String,
}

impl YahooProvider {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            chart_url: config.yahoo_chart_url.trim_end_matches('/').to_string(),
            summary_url: config.yahoo_summary_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<(reqwest::StatusCode, String)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn chart(&self, symbol: &str, query: &str) -> Result<Option<ChartResult>> {
        let url = format!(
            "{}/{}?{}",
            self.chart_url,
            urlencoding::encode(symbol),
            query
        );
        let (status, body) = self.get_text(&url).await?;
        parse_chart(status, &body)
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    async fn fast_quote(&self, symbol: &str) -> Result<Option<f64>> {
        let result = self.chart(symbol, "range=1d&interval=1d").await?;
        Ok(result.and_then(|r| r.meta.regular_market_price))
    }

    async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo> {
        let url = format!(
            "{}/{}?modules={}",
            self.summary_url,
            urlencoding::encode(symbol),
            SUMMARY_MODULES
        );
        let (status, body) = self.get_text(&url).await?;
        parse_summary(status, &body)
    }

    async fn daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let period1 = day_start_timestamp(start);
        // period2 is exclusive
        let period2 = day_start_timestamp(end) + 86_400;
        let query = format!("period1={}&period2={}&interval=1d", period1, period2);

        Ok(self
            .chart(symbol, &query)
            .await?
            .map(|r| r.into_points())
            .unwrap_or_default())
    }
}

fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

impl YahooError {
    fn is_not_found(&self) -> bool {
        matches!(self.code.as_deref(), Some("Not Found"))
    }

    fn describe(&self) -> String {
        format!(
            "{}: {}",
            self.code.as_deref().unwrap_or("error"),
            self.description.as_deref().unwrap_or("no description")
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    /// Exchange offset from UTC in seconds
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResult {
    /// Pair timestamps with closes, dropping null bars
    fn into_points(self) -> Vec<PricePoint> {
        let offset = self.meta.gmtoffset.unwrap_or(0);
        let closes = self
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .map(|q| q.close)
            .unwrap_or_default();

        self.timestamp
            .iter()
            .zip(closes)
            .filter_map(|(ts, close)| {
                let close = close?;
                let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
                Some(PricePoint {
                    date: date.format("%Y-%m-%d").to_string(),
                    price: close,
                })
            })
            .collect()
    }
}

fn parse_chart(status: reqwest::StatusCode, body: &str) -> Result<Option<ChartResult>> {
    let envelope: ChartEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(AppError::Provider(format!("chart request failed: HTTP {}", status)))
        }
    };

    if let Some(error) = envelope.chart.error {
        if error.is_not_found() {
            return Ok(None);
        }
        return Err(AppError::Provider(error.describe()));
    }

    Ok(envelope.chart.result.and_then(|r| r.into_iter().next()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
    error: Option<YahooError>,
}

/// Flatten `{module: {field: {raw: n}}}` into `field -> n`
///
/// The first module to carry a field wins. Yahoo answers 401/403 when the
/// request carries no crumb; the info surface is then simply unavailable.
fn parse_summary(status: reqwest::StatusCode, body: &str) -> Result<QuoteInfo> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        debug!("quoteSummary unavailable (HTTP {}), skipping info surface", status);
        return Ok(QuoteInfo::new());
    }

    let envelope: SummaryEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(AppError::Provider(format!(
                "quoteSummary request failed: HTTP {}",
                status
            )))
        }
    };

    if let Some(error) = envelope.quote_summary.error {
        if error.is_not_found() {
            return Ok(QuoteInfo::new());
        }
        return Err(AppError::Provider(error.describe()));
    }

    let mut info = QuoteInfo::new();
    let modules = envelope
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .unwrap_or_default();

    for module in modules.values() {
        let Some(fields) = module.as_object() else {
            continue;
        };
        for (name, value) in fields {
            let number = match value {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::Object(obj) => obj.get("raw").and_then(|raw| raw.as_f64()),
                _ => None,
            };
            if let Some(number) = number {
                info.entry(name.clone()).or_insert(number);
            }
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{price_key, CachedValue, ManualClock};
    use crate::db::sqlite::SqliteDb;
    use crate::services::QuotesService;
    use crate::state::AppState;
    use axum::{extract::State, routing::get, Router};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const CHART_BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "USD", "symbol": "AAPL", "regularMarketPrice": 189.84, "gmtoffset": -14400},
                "timestamp": [1709649000, 1709735400, 1709821800],
                "indicators": {"quote": [{"close": [170.12, null, 169.0], "open": [1, 2, 3]}]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_price_and_bars() {
        let result = parse_chart(StatusCode::OK, CHART_BODY).unwrap().unwrap();
        assert_eq!(result.meta.regular_market_price, Some(189.84));

        let points = result.into_points();
        assert_eq!(
            points,
            vec![
                PricePoint { date: "2024-03-05".into(), price: 170.12 },
                PricePoint { date: "2024-03-07".into(), price: 169.0 },
            ]
        );
    }

    #[test]
    fn test_parse_chart_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert!(parse_chart(StatusCode::NOT_FOUND, body).unwrap().is_none());
    }

    #[test]
    fn test_parse_chart_errors() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert!(matches!(
            parse_chart(StatusCode::BAD_REQUEST, body),
            Err(AppError::Provider(_))
        ));
        assert!(matches!(
            parse_chart(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"),
            Err(AppError::Provider(_))
        ));
        assert!(matches!(
            parse_chart(StatusCode::OK, "<html>"),
            Err(AppError::Serialization(_))
        ));
    }

    #[test]
    fn test_parse_summary_flattens_modules() {
        let body = r#"{
            "quoteSummary": {
                "result": [{
                    "financialData": {"currentPrice": {"raw": 189.5, "fmt": "189.50"}, "recommendationKey": "buy"},
                    "price": {"regularMarketPrice": {"raw": 189.6, "fmt": "189.60"}, "currency": "USD"},
                    "summaryDetail": {"previousClose": {"raw": 188.0}, "currentPrice": {"raw": 1.0}}
                }],
                "error": null
            }
        }"#;
        let info = parse_summary(StatusCode::OK, body).unwrap();
        assert_eq!(info.get("regularMarketPrice"), Some(&189.6));
        assert_eq!(info.get("previousClose"), Some(&188.0));
        assert!(info.get("recommendationKey").is_none());
        assert!(info.contains_key("currentPrice"));
    }

    const NO_CRUMB_BODY: &str = r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#;
    const CHART_NOT_FOUND_BODY: &str = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;

    #[test]
    fn test_parse_summary_without_crumb_is_empty() {
        assert!(parse_summary(StatusCode::UNAUTHORIZED, NO_CRUMB_BODY)
            .unwrap()
            .is_empty());
        assert!(parse_summary(StatusCode::FORBIDDEN, "Forbidden").unwrap().is_empty());
        assert!(matches!(
            parse_summary(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            Err(AppError::Provider(_))
        ));
    }

    async fn chart_not_found(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
        hits.fetch_add(1, Ordering::SeqCst);
        (StatusCode::NOT_FOUND, CHART_NOT_FOUND_BODY)
    }

    async fn summary_no_crumb(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
        hits.fetch_add(1, Ordering::SeqCst);
        (StatusCode::UNAUTHORIZED, NO_CRUMB_BODY)
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_negative_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/chart/:symbol", get(chart_not_found))
            .route("/summary/:symbol", get(summary_no_crumb))
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = AppConfig {
            yahoo_chart_url: format!("http://{}/chart", addr),
            yahoo_summary_url: format!("http://{}/summary", addr),
            negative_cache_ttl: Duration::from_secs(30),
            provider_rate_limit: 10_000,
            ..AppConfig::default()
        };
        let provider = Arc::new(YahooProvider::new(&config).unwrap());
        let state = AppState::from_parts(
            config,
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            provider,
            Arc::new(ManualClock::new()),
        );

        assert_eq!(QuotesService::cached_current_price(&state, "ZZZZ").await, None);
        // fast quote, info surface, recent bars
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(state.cache.get(&price_key("ZZZZ")), Some(CachedValue::Missing));

        assert_eq!(QuotesService::cached_current_price(&state, "ZZZZ").await, None);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_day_start_timestamp() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(day_start_timestamp(date), 1_709_596_800);
    }
}
