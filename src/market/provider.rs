//! Market-data provider seam
//!
//! Real venue clients live outside the engine; everything in the decision path
//! talks to this trait. The mock implementation produces a seeded random walk
//! so entire runs replay bit-for-bit.

use async_trait::async_trait;
use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{Currency, OrderBook, PriceLevel, Ticker};

/// Read-only market data for one venue
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Top-of-book snapshot for a symbol
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker>;

    /// Order book down to `depth` levels per side
    async fn get_orderbook(&self, symbol: &str, depth: usize) -> Result<OrderBook>;

    /// Venue name this provider serves
    fn venue(&self) -> &str;
}

/// Seeded synthetic feed for one venue
///
/// Prices follow a multiplicative random walk around per-symbol anchors; the
/// book is rebuilt around the current mid on every call. Two instances with
/// different seeds drift apart, which is what creates spread candidates.
pub struct MockMarketProvider {
    venue: String,
    quote_currency: Currency,
    half_spread_bps: Decimal,
    state: Mutex<WalkState>,
}

struct WalkState {
    rng: ChaCha8Rng,
    prices: HashMap<String, Decimal>,
}

impl MockMarketProvider {
    /// `anchors` maps symbol to its starting price in the venue's quote currency.
    pub fn new(
        venue: impl Into<String>,
        quote_currency: Currency,
        anchors: HashMap<String, Decimal>,
        seed: u64,
    ) -> Self {
        Self {
            venue: venue.into(),
            quote_currency,
            half_spread_bps: Decimal::new(5, 0),
            state: Mutex::new(WalkState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                prices: anchors,
            }),
        }
    }

    /// Advance the walk for `symbol` and return the new mid price
    fn step_price(&self, symbol: &str) -> Result<Decimal> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| EngineError::Internal("mock feed state poisoned".to_string()))?;
        let current = *state
            .prices
            .get(symbol)
            .ok_or_else(|| EngineError::MarketData(format!("unknown symbol: {symbol}")))?;

        // Walk up to +/-30 bps per call
        let step_bps: i64 = state.rng.gen_range(-30..=30);
        let next = current + current * Decimal::new(step_bps, 4);
        state.prices.insert(symbol.to_string(), next);
        Ok(next)
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketProvider {
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker> {
        let mid = self.step_price(symbol)?;
        let half_spread = mid * self.half_spread_bps / Decimal::from(10_000);
        Ok(Ticker {
            venue: self.venue.clone(),
            symbol: symbol.to_string(),
            bid: mid - half_spread,
            ask: mid + half_spread,
            last: mid,
            quote_currency: self.quote_currency,
            timestamp: Utc::now(),
        })
    }

    async fn get_orderbook(&self, symbol: &str, depth: usize) -> Result<OrderBook> {
        let mid = {
            let state = self
                .state
                .lock()
                .map_err(|_| EngineError::Internal("mock feed state poisoned".to_string()))?;
            *state
                .prices
                .get(symbol)
                .ok_or_else(|| EngineError::MarketData(format!("unknown symbol: {symbol}")))?
        };

        let tick = mid * self.half_spread_bps / Decimal::from(10_000);
        let mut bids = Vec::with_capacity(depth);
        let mut asks = Vec::with_capacity(depth);
        for level in 0..depth {
            let offset = tick * Decimal::from((level + 1) as u64);
            // Deeper levels rest more size
            let size = Decimal::new(2, 1) * Decimal::from((level + 1) as u64);
            bids.push(PriceLevel::new(mid - offset, size));
            asks.push(PriceLevel::new(mid + offset, size));
        }
        Ok(OrderBook {
            venue: self.venue.clone(),
            symbol: symbol.to_string(),
            bids,
            asks,
            timestamp: Utc::now(),
        })
    }

    fn venue(&self) -> &str {
        &self.venue
    }
}
