//! Order intents and the pair builder
//!
//! A profitable candidate becomes exactly two market intents: buy the cheaper
//! venue, sell the other. The sell leg's size is provisional until it is
//! rewritten to the entry's actual filled quantity; executing it unsynced is a
//! contract violation, not a warning.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{OrderType, Side};
use crate::detector::opportunity::OpportunityCandidate;

/// Where an intent's quantity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QtySource {
    /// Sized directly from configuration
    Direct,
    /// Must be rewritten to the entry leg's filled quantity before execution
    FromEntryFill,
}

/// Order size by the side/type contract: market buys spend quote currency,
/// sells dispose of base quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSize {
    QuoteAmount(Decimal),
    BaseQty(Decimal),
}

/// One simulated order to be placed on one venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub size: IntentSize,
    pub limit_price: Option<Decimal>,
    pub qty_source: QtySource,
    synced: bool,
}

impl OrderIntent {
    /// Whether the intent may be handed to an executor
    pub fn is_ready(&self) -> bool {
        match self.qty_source {
            QtySource::Direct => true,
            QtySource::FromEntryFill => self.synced,
        }
    }

    /// Rewrite the size to the entry leg's filled quantity
    pub fn sync_exit_quantity(&mut self, entry_filled_qty: Decimal) -> Result<()> {
        if self.qty_source != QtySource::FromEntryFill {
            return Err(EngineError::ContractViolation(
                "sync_exit_quantity called on a directly-sized intent".to_string(),
            ));
        }
        if entry_filled_qty <= Decimal::ZERO {
            return Err(EngineError::ContractViolation(format!(
                "entry filled quantity must be positive, got {entry_filled_qty}"
            )));
        }
        self.size = IntentSize::BaseQty(entry_filled_qty);
        self.synced = true;
        Ok(())
    }
}

/// The atomic entry/exit pair built from one candidate
#[derive(Debug, Clone)]
pub struct IntentPair {
    pub entry: OrderIntent,
    pub exit: OrderIntent,
}

/// Builds intent pairs from candidates
#[derive(Debug, Clone)]
pub struct IntentBuilder {
    quote_notional_krw: Decimal,
}

impl IntentBuilder {
    pub fn new(quote_notional_krw: Decimal) -> Self {
        Self { quote_notional_krw }
    }

    /// Zero intents for unprofitable or direction-less candidates (unless the
    /// override is set), otherwise exactly two opposite-side market intents.
    pub fn build_pair(&self, candidate: &OpportunityCandidate) -> Option<IntentPair> {
        let (buy_venue, sell_venue) = candidate.legs()?;
        if !candidate.profitable() && !candidate.allow_unprofitable {
            return None;
        }
        let buy_price = candidate.buy_price()?;

        let entry = OrderIntent {
            exchange: buy_venue.to_string(),
            symbol: candidate.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Market,
            size: IntentSize::QuoteAmount(self.quote_notional_krw),
            limit_price: None,
            qty_source: QtySource::Direct,
            synced: true,
        };
        // Provisional size only; the executor must sync it to the entry fill
        let exit = OrderIntent {
            exchange: sell_venue.to_string(),
            symbol: candidate.symbol.clone(),
            side: Side::Sell,
            order_type: OrderType::Market,
            size: IntentSize::BaseQty(self.quote_notional_krw / buy_price),
            limit_price: None,
            qty_source: QtySource::FromEntryFill,
            synced: false,
        };
        Some(IntentPair { entry, exit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::fees::{BreakEvenParams, FeePair, FeeStructure};
    use rust_decimal_macros::dec;

    fn candidate(price_a: Decimal, price_b: Decimal) -> OpportunityCandidate {
        let params = BreakEvenParams {
            fees: FeePair::new(
                FeeStructure::new("upbit", dec!(0), dec!(5)),
                FeeStructure::new("binance", dec!(0), dec!(10)),
            ),
            slippage_bps: dec!(5),
            latency_bps: dec!(0),
            buffer_bps: dec!(0),
        };
        OpportunityCandidate::evaluate("BTC", "upbit", "binance", price_a, price_b, &params, dec!(0))
            .unwrap()
    }

    #[test]
    fn test_profitable_candidate_builds_two_intents() {
        let builder = IntentBuilder::new(dec!(1_000_000));
        // 100 bps spread, break-even 40: profitable
        let c = candidate(dec!(99_000_000), dec!(100_000_000));
        let pair = builder.build_pair(&c).unwrap();

        assert_eq!(pair.entry.exchange, "upbit");
        assert_eq!(pair.entry.side, Side::Buy);
        assert_eq!(pair.entry.size, IntentSize::QuoteAmount(dec!(1_000_000)));
        assert!(pair.entry.is_ready());

        assert_eq!(pair.exit.exchange, "binance");
        assert_eq!(pair.exit.side, Side::Sell);
        assert_eq!(pair.exit.qty_source, QtySource::FromEntryFill);
        assert!(!pair.exit.is_ready());
    }

    #[test]
    fn test_unprofitable_candidate_builds_nothing() {
        let builder = IntentBuilder::new(dec!(1_000_000));
        // 10 bps spread, break-even 40: not profitable
        let c = candidate(dec!(99_900_000), dec!(100_000_000));
        assert!(!c.profitable());
        assert!(builder.build_pair(&c).is_none());
    }

    #[test]
    fn test_override_builds_despite_negative_edge() {
        let builder = IntentBuilder::new(dec!(1_000_000));
        let mut c = candidate(dec!(99_900_000), dec!(100_000_000));
        c.allow_unprofitable = true;
        assert!(builder.build_pair(&c).is_some());
    }

    #[test]
    fn test_flat_prices_build_nothing_even_with_override() {
        let builder = IntentBuilder::new(dec!(1_000_000));
        let mut c = candidate(dec!(100), dec!(100));
        c.allow_unprofitable = true;
        assert!(builder.build_pair(&c).is_none());
    }

    #[test]
    fn test_exit_sync_contract() {
        let builder = IntentBuilder::new(dec!(1_000_000));
        let c = candidate(dec!(99_000_000), dec!(100_000_000));
        let mut pair = builder.build_pair(&c).unwrap();

        pair.exit.sync_exit_quantity(dec!(0.0101)).unwrap();
        assert!(pair.exit.is_ready());
        assert_eq!(pair.exit.size, IntentSize::BaseQty(dec!(0.0101)));

        // Syncing the entry leg is a contract violation
        assert!(pair.entry.sync_exit_quantity(dec!(1)).is_err());
    }

    #[test]
    fn test_sync_rejects_non_positive_qty() {
        let builder = IntentBuilder::new(dec!(1_000_000));
        let c = candidate(dec!(99_000_000), dec!(100_000_000));
        let mut pair = builder.build_pair(&c).unwrap();
        assert!(pair.exit.sync_exit_quantity(dec!(0)).is_err());
        assert!(!pair.exit.is_ready());
    }
}
