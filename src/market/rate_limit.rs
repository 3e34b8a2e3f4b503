//! Per-venue token-bucket rate limiting
//!
//! Each venue gets an independent bucket. Exhaustion is a recoverable per-tick
//! skip counted against the venue, never a fatal error.

use std::sync::Mutex;
use std::time::Instant;

use crate::common::errors::{EngineError, Result};

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token bucket guarding outbound data calls to one venue
pub struct VenueRateLimiter {
    venue: String,
    bucket: Mutex<TokenBucket>,
}

impl VenueRateLimiter {
    pub fn new(venue: impl Into<String>, capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            venue: venue.into(),
            bucket: Mutex::new(TokenBucket::new(capacity, refill_per_sec)),
        }
    }

    /// Take one token or fail with a recoverable rate-limit error
    pub fn acquire(&self) -> Result<()> {
        self.acquire_at(Instant::now())
    }

    fn acquire_at(&self, now: Instant) -> Result<()> {
        let mut bucket = self
            .bucket
            .lock()
            .map_err(|_| EngineError::Internal("rate limiter poisoned".to_string()))?;
        if bucket.try_acquire(now) {
            Ok(())
        } else {
            Err(EngineError::RateLimited {
                venue: self.venue.clone(),
            })
        }
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }
}
