//! PnL welding
//!
//! Gross PnL is the frictionless reference-to-reference value of the pair;
//! exactly five frictions are welded out of it: trading fees, slippage cost,
//! latency cost (the price impact of drift, decoupled from latency *time*,
//! which is tracked separately in milliseconds), partial-fill penalty, and
//! spread cost. Arbitrage PnL is meaningless across mismatched leg sizes, so
//! a quantity divergence beyond 1% is an error, never an average.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::OrderBook;
use crate::execution::simulator::FillResult;

/// Maximum tolerated entry/exit quantity divergence
pub const QTY_TOLERANCE_PCT: Decimal = dec!(1);

/// Fully-welded result of one closed pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePnl {
    pub symbol: String,
    /// Frictionless reference-to-reference value
    pub gross_pnl: Decimal,
    pub fees_total: Decimal,
    pub slippage_cost: Decimal,
    pub latency_cost: Decimal,
    pub partial_fill_penalty: Decimal,
    pub spread_cost: Decimal,
    pub net_pnl_full: Decimal,
    /// Observability only
    pub entry_latency_ms: u64,
    pub exit_latency_ms: u64,
}

impl TradePnl {
    pub fn is_win(&self) -> bool {
        self.net_pnl_full > Decimal::ZERO
    }

    pub fn friction_total(&self) -> Decimal {
        self.fees_total
            + self.slippage_cost
            + self.latency_cost
            + self.partial_fill_penalty
            + self.spread_cost
    }
}

/// Welds entry and exit fills into a net PnL
#[derive(Debug, Clone, Default)]
pub struct PnlWelder;

impl PnlWelder {
    /// Weld one closed pair
    ///
    /// `buy_ref`/`sell_ref` are the reference prices the fills were simulated
    /// against. Books, when present, price the spread cost of each leg from
    /// its midpoint; without book data spread cost is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn weld(
        &self,
        symbol: &str,
        entry: &FillResult,
        exit: &FillResult,
        buy_ref: Decimal,
        sell_ref: Decimal,
        buy_book: Option<&OrderBook>,
        sell_book: Option<&OrderBook>,
    ) -> Result<TradePnl> {
        if entry.filled_qty <= Decimal::ZERO {
            return Err(EngineError::ContractViolation(
                "entry leg has no filled quantity".to_string(),
            ));
        }
        let divergence_pct =
            ((entry.filled_qty - exit.filled_qty) / entry.filled_qty).abs() * dec!(100);
        if divergence_pct > QTY_TOLERANCE_PCT {
            return Err(EngineError::QuantityMismatch {
                entry_qty: entry.filled_qty.to_string(),
                exit_qty: exit.filled_qty.to_string(),
                tolerance_pct: QTY_TOLERANCE_PCT.to_string(),
            });
        }

        let qty = entry.filled_qty;
        let bps = Decimal::from(10_000);

        let gross_pnl = (sell_ref - buy_ref) * qty;
        let fees_total = entry.fee + exit.fee;

        // Drift decomposition: each fill's drift = slippage + latency portion
        let entry_latency_bps = entry.pessimistic_drift_bps - entry.slippage_bps;
        let exit_latency_bps = exit.pessimistic_drift_bps - exit.slippage_bps;
        let slippage_cost =
            (buy_ref * entry.slippage_bps / bps + sell_ref * exit.slippage_bps / bps) * qty;
        let latency_cost =
            (buy_ref * entry_latency_bps / bps + sell_ref * exit_latency_bps / bps) * qty;

        // Quantity the pair failed to carry, priced at the gross edge
        let worst_ratio = entry.partial_fill_ratio.min(exit.partial_fill_ratio);
        let partial_fill_penalty =
            ((Decimal::ONE - worst_ratio) * (sell_ref - buy_ref).abs() * qty).max(Decimal::ZERO);

        let spread_cost = leg_spread_cost(buy_book, qty, true)
            + leg_spread_cost(sell_book, qty, false);

        let net_pnl_full = gross_pnl
            - fees_total
            - slippage_cost
            - latency_cost
            - partial_fill_penalty
            - spread_cost;

        Ok(TradePnl {
            symbol: symbol.to_string(),
            gross_pnl,
            fees_total,
            slippage_cost,
            latency_cost,
            partial_fill_penalty,
            spread_cost,
            net_pnl_full,
            entry_latency_ms: entry.latency_ms,
            exit_latency_ms: exit.latency_ms,
        })
    }
}

/// Half-spread paid by one leg: executed side vs midpoint
fn leg_spread_cost(book: Option<&OrderBook>, qty: Decimal, is_buy: bool) -> Decimal {
    let Some(book) = book else {
        return Decimal::ZERO;
    };
    let (Some(mid), Some(bid), Some(ask)) = (
        book.midpoint(),
        book.best_bid().map(|l| l.price),
        book.best_ask().map(|l| l.price),
    ) else {
        return Decimal::ZERO;
    };
    let half_spread = if is_buy { ask - mid } else { mid - bid };
    (half_spread * qty).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::PriceLevel;
    use chrono::Utc;

    fn fill(qty: Decimal, price: Decimal, fee: Decimal, slip_bps: Decimal, drift_bps: Decimal, ratio: Decimal) -> FillResult {
        FillResult {
            filled_qty: qty,
            filled_price: price,
            fee,
            slippage_bps: slip_bps,
            pessimistic_drift_bps: drift_bps,
            latency_ms: 120,
            partial_fill_ratio: ratio,
            rejected: false,
        }
    }

    fn book(bid: Decimal, ask: Decimal) -> OrderBook {
        OrderBook {
            venue: "upbit".to_string(),
            symbol: "BTC".to_string(),
            bids: vec![PriceLevel::new(bid, dec!(1))],
            asks: vec![PriceLevel::new(ask, dec!(1))],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_five_frictions_weld_exactly() {
        let welder = PnlWelder;
        // Buy ref 99M, sell ref 100M, qty 0.01: gross = 10,000
        let entry = fill(dec!(0.01), dec!(99_148_500), dec!(4_957), dec!(10), dec!(15), Decimal::ONE);
        let exit = fill(dec!(0.01), dec!(99_850_000), dec!(9_985), dec!(10), dec!(15), Decimal::ONE);
        let pnl = welder
            .weld("BTC", &entry, &exit, dec!(99_000_000), dec!(100_000_000), None, None)
            .unwrap();

        assert_eq!(pnl.gross_pnl, dec!(10_000));
        assert_eq!(pnl.fees_total, dec!(14_942));
        // slippage: (99M + 100M) * 10bps * 0.01 = 1,990
        assert_eq!(pnl.slippage_cost, dec!(1_990.0000));
        // latency: (99M + 100M) * 5bps * 0.01 = 995
        assert_eq!(pnl.latency_cost, dec!(995.0000));
        assert_eq!(pnl.partial_fill_penalty, dec!(0));
        assert_eq!(pnl.spread_cost, dec!(0));
        assert_eq!(
            pnl.net_pnl_full,
            dec!(10_000) - dec!(14_942) - dec!(1_990) - dec!(995)
        );
        assert!(!pnl.is_win());
        assert_eq!(pnl.friction_total(), dec!(17_927.0000));
    }

    #[test]
    fn test_partial_fill_penalty() {
        let welder = PnlWelder;
        let entry = fill(dec!(0.008), dec!(99_000_000), dec!(0), dec!(0), dec!(0), dec!(0.8));
        let exit = fill(dec!(0.008), dec!(100_000_000), dec!(0), dec!(0), dec!(0), Decimal::ONE);
        let pnl = welder
            .weld("BTC", &entry, &exit, dec!(99_000_000), dec!(100_000_000), None, None)
            .unwrap();
        // 20% of the pair never carried: 0.2 * 1,000,000 * 0.008 = 1,600
        assert_eq!(pnl.partial_fill_penalty, dec!(1_600.000));
    }

    #[test]
    fn test_spread_cost_from_books() {
        let welder = PnlWelder;
        let entry = fill(dec!(1), dec!(100), dec!(0), dec!(0), dec!(0), Decimal::ONE);
        let exit = fill(dec!(1), dec!(100), dec!(0), dec!(0), dec!(0), Decimal::ONE);
        let buy_book = book(dec!(99), dec!(101));
        let sell_book = book(dec!(98), dec!(102));
        let pnl = welder
            .weld(
                "BTC",
                &entry,
                &exit,
                dec!(100),
                dec!(100),
                Some(&buy_book),
                Some(&sell_book),
            )
            .unwrap();
        // Buy leg: ask 101 - mid 100 = 1; sell leg: mid 100 - bid 98 = 2
        assert_eq!(pnl.spread_cost, dec!(3));
    }

    #[test]
    fn test_qty_mismatch_beyond_tolerance_errors() {
        let welder = PnlWelder;
        let entry = fill(dec!(1), dec!(100), dec!(0), dec!(0), dec!(0), Decimal::ONE);
        let exit = fill(dec!(0.98), dec!(100), dec!(0), dec!(0), dec!(0), Decimal::ONE);
        let err = welder
            .weld("BTC", &entry, &exit, dec!(100), dec!(100), None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::QuantityMismatch { .. }));
    }

    #[test]
    fn test_qty_mismatch_within_tolerance_welds() {
        let welder = PnlWelder;
        let entry = fill(dec!(1), dec!(100), dec!(0), dec!(0), dec!(0), Decimal::ONE);
        let exit = fill(dec!(0.995), dec!(100), dec!(0), dec!(0), dec!(0), Decimal::ONE);
        assert!(welder
            .weld("BTC", &entry, &exit, dec!(100), dec!(100), None, None)
            .is_ok());
    }

    #[test]
    fn test_zero_entry_qty_is_contract_violation() {
        let welder = PnlWelder;
        let entry = fill(dec!(0), dec!(100), dec!(0), dec!(0), dec!(0), Decimal::ZERO);
        let exit = fill(dec!(1), dec!(100), dec!(0), dec!(0), dec!(0), Decimal::ONE);
        let err = welder
            .weld("BTC", &entry, &exit, dec!(100), dec!(100), None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::ContractViolation(_)));
    }
}
