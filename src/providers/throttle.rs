//! Outbound rate limiting for provider calls
//!
//! Token bucket shared by every request. Callers wait for a token
//! instead of failing, so a burst of uncached symbols is spread out
//! rather than tripping the provider's own limits.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Token bucket rate limiter
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    tokens: f64,
    /// Tokens added per second
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_second: u32) -> Self {
        let rate = rate_per_second.max(1);
        Self {
            capacity: rate,
            tokens: rate as f64,
            refill_rate: rate as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate)
            .min(self.capacity as f64);
        self.last_refill = now;
    }

    /// Consume a token if one is available
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token is available
    pub fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// Shared throttle in front of the market data provider
#[derive(Debug)]
pub struct ProviderThrottle {
    bucket: Mutex<TokenBucket>,
}

impl ProviderThrottle {
    pub fn new(rate_per_second: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(rate_per_second)),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.bucket.lock().try_acquire()
    }

    /// Wait until a token can be taken
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_available()
            };
            tracing::debug!("Provider throttle engaged, waiting {:?}", wait);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}
