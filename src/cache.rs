//! Expiring price cache
//!
//! Process-wide key/value store shared by every request. A read is a hit
//! only while `now - inserted_at < ttl`; stale slots are left in place and
//! replaced by the next successful fetch for the same key.
//!
//! Keys are namespaced by kind:
//! - `price:<SYMBOL>` - latest price
//! - `history:<SYMBOL>:<PERIOD>` - daily close series

use crate::providers::types::PricePoint;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source for the cache, swappable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: parking_lot::Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: parking_lot::Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// Payload stored in the price cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Price(f64),
    History(Arc<Vec<PricePoint>>),
    /// Provider answered definitively with no data
    Missing,
}

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

/// Concurrent TTL cache keyed by string
pub struct ExpiringCache<V> {
    entries: DashMap<String, Slot<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ExpiringCache<V> {
    /// Create a cache using the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Fresh value for `key`, or `None` when absent or stale
    pub fn get(&self, key: &str) -> Option<V> {
        let slot = self.entries.get(key)?;
        let age = self.clock.now().saturating_duration_since(slot.inserted_at);
        if age < slot.ttl {
            Some(slot.value.clone())
        } else {
            None
        }
    }

    /// Upsert with the default TTL, timestamped now
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    /// Upsert with an explicit TTL; a zero TTL is a no-op
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let slot = Slot {
            value,
            inserted_at: self.clock.now(),
            ttl,
        };
        self.entries.insert(key.into(), slot);
    }

    /// Number of slots held, stale ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key for a symbol's latest price
pub fn price_key(symbol: &str) -> String {
    format!("price:{}", symbol)
}

/// Cache key for a symbol's daily series over a named period
pub fn history_key(symbol: &str, period: &str) -> String {
    format!("history:{}:{}", symbol, period)
}
