//! Common market data types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One daily close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: String, // YYYY-MM-DD
    pub price: f64,
}

/// Numeric fields from a provider's general info surface, by field name
pub type QuoteInfo = HashMap<String, f64>;

/// Outcome of one adapter operation
///
/// Only the adapter boundary collapses this to "price or nothing";
/// the variants stay distinct for logging and negative caching.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome<T> {
    Value(T),
    /// Provider answered and had nothing for the symbol
    NoData,
    /// Network error, timeout, malformed payload or provider failure
    Transient(String),
}

impl<T> ProviderOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            ProviderOutcome::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Round a price to cents
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A usable quote is a finite, strictly positive number
pub fn is_valid_price(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
