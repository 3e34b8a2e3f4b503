//! Unified types used across the engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::EngineError;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order execution type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// Quote currency for a venue's prices
///
/// The engine settles everything in KRW; anything else is converted through
/// the FX provider before two venues are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Krw,
    Usd,
    Usdt,
    Usdc,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Krw => "KRW",
            Currency::Usd => "USD",
            Currency::Usdt => "USDT",
            Currency::Usdc => "USDC",
        }
    }
}

impl FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "KRW" => Ok(Currency::Krw),
            "USD" => Ok(Currency::Usd),
            "USDT" => Ok(Currency::Usdt),
            "USDC" => Ok(Currency::Usdc),
            other => Err(EngineError::UnsupportedCurrency(other.to_string())),
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Closed set of reasons a candidate or trade attempt is rejected
///
/// This is the authoritative key set of the KPI reject histogram; adding a
/// variant here is the only way to introduce a new reject reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Ticker fetch failed or returned nothing
    PriceUnavailable,
    /// A normalized price was zero or negative
    NonPositivePrice,
    /// Spread/edge magnitude tripped the units-mismatch sanity guard
    UnitsMismatch,
    /// FX rate older than the TTL
    FxStale,
    /// FX provider returned no usable rate
    FxUnavailable,
    /// Token bucket exhausted on the entry venue
    RatelimitEntry,
    /// Token bucket exhausted on the exit venue
    RatelimitExit,
    /// Order-book imbalance outside the direction gate
    ObiThreshold,
    /// Dropped by the per-tick top-K rank cut
    RankCut,
    /// Net edge below the calibrated threshold
    BelowThreshold,
    /// Candidate not profitable and overrides disabled
    NotProfitable,
    /// Simulated venue rejected the order
    SimulatedReject,
    /// Entry/exit fill quantities diverged beyond tolerance
    QtyMismatch,
}

impl RejectReason {
    /// Stable string key used in evidence artifacts
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::PriceUnavailable => "price_unavailable",
            RejectReason::NonPositivePrice => "non_positive_price",
            RejectReason::UnitsMismatch => "units_mismatch",
            RejectReason::FxStale => "fx_stale",
            RejectReason::FxUnavailable => "fx_unavailable",
            RejectReason::RatelimitEntry => "ratelimit_entry",
            RejectReason::RatelimitExit => "ratelimit_exit",
            RejectReason::ObiThreshold => "obi_threshold",
            RejectReason::RankCut => "rank_cut",
            RejectReason::BelowThreshold => "below_threshold",
            RejectReason::NotProfitable => "not_profitable",
            RejectReason::SimulatedReject => "simulated_reject",
            RejectReason::QtyMismatch => "qty_mismatch",
        }
    }

    /// Every reason, in histogram order
    pub fn all() -> &'static [RejectReason] {
        &[
            RejectReason::PriceUnavailable,
            RejectReason::NonPositivePrice,
            RejectReason::UnitsMismatch,
            RejectReason::FxStale,
            RejectReason::FxUnavailable,
            RejectReason::RatelimitEntry,
            RejectReason::RatelimitExit,
            RejectReason::ObiThreshold,
            RejectReason::RankCut,
            RejectReason::BelowThreshold,
            RejectReason::NotProfitable,
            RejectReason::SimulatedReject,
            RejectReason::QtyMismatch,
        ]
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-of-book ticker snapshot from one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Venue this ticker is from
    pub venue: String,
    /// Traded symbol (base asset, e.g. "BTC")
    pub symbol: String,
    /// Best bid price in the venue's quote currency
    pub bid: Decimal,
    /// Best ask price in the venue's quote currency
    pub ask: Decimal,
    /// Last traded price in the venue's quote currency
    pub last: Decimal,
    /// Currency the prices are quoted in
    pub quote_currency: Currency,
    /// Timestamp of this snapshot
    pub timestamp: DateTime<Utc>,
}

/// A single price level in an order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level
    pub price: Decimal,
    /// Total size/quantity resting at this price level
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Order book snapshot for a market on one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Venue this order book is from
    pub venue: String,
    /// Traded symbol
    pub symbol: String,
    /// Bid (buy) orders sorted by price descending
    pub bids: Vec<PriceLevel>,
    /// Ask (sell) orders sorted by price ascending
    pub asks: Vec<PriceLevel>,
    /// Timestamp of this snapshot
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// Get the best bid price (highest buy order)
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Get the best ask price (lowest sell order)
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Calculate the midpoint price
    pub fn midpoint(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Total bid quantity across the top `levels` levels
    pub fn bid_depth(&self, levels: usize) -> Decimal {
        self.bids.iter().take(levels).map(|l| l.size).sum()
    }

    /// Total ask quantity across the top `levels` levels
    pub fn ask_depth(&self, levels: usize) -> Decimal {
        self.asks.iter().take(levels).map(|l| l.size).sum()
    }

    /// Average resting size across the top `levels` levels of both sides
    ///
    /// Returns None when the book is empty, which downstream models treat as
    /// "no depth data" and replace with a conservative penalty.
    pub fn avg_top_size(&self, levels: usize) -> Option<Decimal> {
        let sizes: Vec<Decimal> = self
            .bids
            .iter()
            .take(levels)
            .chain(self.asks.iter().take(levels))
            .map(|l| l.size)
            .collect();
        if sizes.is_empty() {
            return None;
        }
        let total: Decimal = sizes.iter().copied().sum();
        Some(total / Decimal::from(sizes.len() as u64))
    }
}
