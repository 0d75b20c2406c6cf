//! Runtime configuration
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file in the working directory. Every setting has a default so
//! the server starts with no configuration at all.

use crate::error::{AppError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
pub const DEFAULT_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Server and price-engine configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Lifetime of a cached price or history series
    pub cache_ttl: Duration,
    /// Lifetime of a cached "no data" answer; zero disables negative caching
    pub negative_cache_ttl: Duration,
    /// Upper bound on symbols fetched in parallel for one request
    pub max_concurrency: usize,
    pub provider_timeout: Duration,
    /// Outbound provider calls allowed per second
    pub provider_rate_limit: u32,
    pub yahoo_chart_url: String,
    pub yahoo_summary_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            db_path: PathBuf::from("stocks.db"),
            cache_ttl: Duration::from_secs(300),
            negative_cache_ttl: Duration::ZERO,
            max_concurrency: 8,
            provider_timeout: Duration::from_secs(5),
            provider_rate_limit: 10,
            yahoo_chart_url: DEFAULT_CHART_URL.to_string(),
            yahoo_summary_url: DEFAULT_SUMMARY_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `WATCHLIST_*` environment variables
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal in production
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_concurrency: usize =
            parse_or(&lookup, "WATCHLIST_MAX_CONCURRENCY", defaults.max_concurrency)?;
        if max_concurrency == 0 {
            return Err(AppError::Config(
                "WATCHLIST_MAX_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let provider_rate_limit: u32 =
            parse_or(&lookup, "WATCHLIST_PROVIDER_RATE_LIMIT", defaults.provider_rate_limit)?;
        if provider_rate_limit == 0 {
            return Err(AppError::Config(
                "WATCHLIST_PROVIDER_RATE_LIMIT must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host: lookup("WATCHLIST_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "WATCHLIST_PORT", defaults.port)?,
            db_path: lookup("WATCHLIST_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "WATCHLIST_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            negative_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "WATCHLIST_NEGATIVE_CACHE_TTL_SECS",
                defaults.negative_cache_ttl.as_secs(),
            )?),
            max_concurrency,
            provider_timeout: Duration::from_secs(parse_or(
                &lookup,
                "WATCHLIST_PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout.as_secs(),
            )?),
            provider_rate_limit,
            yahoo_chart_url: lookup("WATCHLIST_YAHOO_CHART_URL").unwrap_or(defaults.yahoo_chart_url),
            yahoo_summary_url: lookup("WATCHLIST_YAHOO_SUMMARY_URL")
                .unwrap_or(defaults.yahoo_summary_url),
        })
    }

    /// Socket address string the API server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid value for {}: {} ({})", key, raw, e))),
        None => Ok(default),
    }
}
