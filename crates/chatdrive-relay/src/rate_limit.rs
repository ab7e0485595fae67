//! Proactive rate limiting for relay API calls.
//!
//! The backend rate-limits per bot token; waiting for 429s wastes a request
//! and risks escalating penalties, so the client throttles itself with a
//! classic token bucket and only falls back to `Retry-After` handling when
//! the server throttles anyway.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Shortest sleep while waiting for a token, so refill math granularity
/// never busy-spins the task.
const MIN_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct TokenBucketInner {
    /// Current number of available tokens (fractional for smooth refill)
    tokens: f64,
    /// Timestamp of the last refill calculation
    last_refill: Instant,
}

/// Token bucket rate limiter.
///
/// Tokens are consumed on each request and refilled at a constant rate.
/// The bucket starts full, so bursts up to `capacity` pass untouched.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    /// Tokens added per second
    refill_rate: f64,
    inner: Mutex<TokenBucketInner>,
}

impl TokenBucket {
    /// Create a bucket holding up to `capacity` tokens, refilled at
    /// `refill_rate` tokens per second. Starts full.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            inner: Mutex::new(TokenBucketInner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, inner: &mut TokenBucketInner) {
        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            inner.tokens = (inner.tokens + elapsed * self.refill_rate).min(self.capacity as f64);
            inner.last_refill = now;
        }
    }

    /// Attempt to take one token without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        self.refill(&mut inner);
        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Estimated seconds until a token becomes available. 0.0 when one
    /// already is.
    pub fn time_until_available(&self) -> f64 {
        let mut inner = self.inner.lock().unwrap();
        self.refill(&mut inner);
        if inner.tokens >= 1.0 {
            0.0
        } else if self.refill_rate > 0.0 {
            (1.0 - inner.tokens) / self.refill_rate
        } else {
            f64::MAX
        }
    }

    /// Currently available tokens (after refill).
    pub fn available_tokens(&self) -> f64 {
        let mut inner = self.inner.lock().unwrap();
        self.refill(&mut inner);
        inner.tokens
    }

    /// Maximum tokens the bucket can hold.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            let wait = Duration::from_secs_f64(self.time_until_available()).max(MIN_WAIT);
            debug!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Parse a `Retry-After` header value (delta-seconds form).
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
