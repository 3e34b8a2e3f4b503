use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee configuration for one exchange
///
/// Fees are signed basis points of notional; a negative maker fee is a rebate.
/// Loaded once at startup and never mutated during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeStructure {
    pub exchange: String,
    /// Maker fee (resting on the book) in bps; negative = rebate
    pub maker_fee_bps: Decimal,
    /// Taker fee (crossing the spread) in bps
    pub taker_fee_bps: Decimal,
}

impl FeeStructure {
    pub fn new(exchange: impl Into<String>, maker_fee_bps: Decimal, taker_fee_bps: Decimal) -> Self {
        Self {
            exchange: exchange.into(),
            maker_fee_bps,
            taker_fee_bps,
        }
    }
}

/// The two venues an arbitrage pair trades across
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePair {
    pub entry: FeeStructure,
    pub exit: FeeStructure,
}

impl FeePair {
    pub fn new(entry: FeeStructure, exit: FeeStructure) -> Self {
        Self { entry, exit }
    }

    /// Taker fee paid for one pass of the pair (one leg on each venue)
    pub fn pass_taker_fee_bps(&self) -> Decimal {
        self.entry.taker_fee_bps + self.exit.taker_fee_bps
    }
}

/// Immutable per-run parameters for the break-even threshold
///
/// A tuner may override these between runs; within a run they are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakEvenParams {
    pub fees: FeePair,
    /// Expected one-way slippage per leg in bps
    pub slippage_bps: Decimal,
    /// Expected one-way latency-drift per leg in bps
    pub latency_bps: Decimal,
    /// Safety buffer in bps
    pub buffer_bps: Decimal,
}

impl BreakEvenParams {
    /// Break-even spread for this pair
    ///
    /// The position is opened with one pass (buy cheap venue, sell expensive
    /// venue) and unwound with a second pass, so both venues' taker fees are
    /// paid twice. Slippage and latency drift hit once per pass.
    pub fn break_even_bps(&self) -> Decimal {
        let pass_fee = self.fees.pass_taker_fee_bps();
        compute_break_even_bps(
            pass_fee,
            pass_fee,
            self.slippage_bps,
            self.latency_bps,
            self.buffer_bps,
        )
    }
}

/// Round-trip break-even threshold in bps
///
/// `fee_entry_bps` and `fee_exit_bps` are the total fees of the entry pass and
/// the unwind pass. The execution-risk term is doubled because slippage and
/// latency drift are incurred on both passes.
pub fn compute_break_even_bps(
    fee_entry_bps: Decimal,
    fee_exit_bps: Decimal,
    slippage_bps: Decimal,
    latency_bps: Decimal,
    buffer_bps: Decimal,
) -> Decimal {
    fee_entry_bps + fee_exit_bps + Decimal::TWO * (slippage_bps + latency_bps) + buffer_bps
}

/// Edge of a spread over the break-even threshold, in bps
pub fn compute_edge_bps(spread_bps: Decimal, break_even_bps: Decimal) -> Decimal {
    spread_bps - break_even_bps
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair(entry_taker: Decimal, exit_taker: Decimal) -> FeePair {
        FeePair::new(
            FeeStructure::new("upbit", dec!(2.5), entry_taker),
            FeeStructure::new("binance", dec!(1.0), exit_taker),
        )
    }

    #[test]
    fn test_break_even_worked_example() {
        // Per-venue fees 5 and 10 bps, slippage 10, latency 0, buffer 5.
        // Entry pass fees = 15, unwind pass fees = 15.
        // 15 + 15 + 2*(10 + 0) + 5 = 55
        let params = BreakEvenParams {
            fees: pair(dec!(5), dec!(10)),
            slippage_bps: dec!(10),
            latency_bps: dec!(0),
            buffer_bps: dec!(5),
        };
        assert_eq!(params.break_even_bps(), dec!(55));
    }

    #[test]
    fn test_break_even_exact_components() {
        // 8 + 8 + 2*(3 + 2) + 1 = 27
        let result = compute_break_even_bps(dec!(8), dec!(8), dec!(3), dec!(2), dec!(1));
        assert_eq!(result, dec!(27));
    }

    #[test]
    fn test_break_even_zero_inputs() {
        assert_eq!(
            compute_break_even_bps(dec!(0), dec!(0), dec!(0), dec!(0), dec!(0)),
            dec!(0)
        );
    }

    #[test]
    fn test_break_even_monotone_in_each_input() {
        let base = compute_break_even_bps(dec!(5), dec!(5), dec!(4), dec!(3), dec!(2));
        let bumps = [
            compute_break_even_bps(dec!(6), dec!(5), dec!(4), dec!(3), dec!(2)),
            compute_break_even_bps(dec!(5), dec!(6), dec!(4), dec!(3), dec!(2)),
            compute_break_even_bps(dec!(5), dec!(5), dec!(5), dec!(3), dec!(2)),
            compute_break_even_bps(dec!(5), dec!(5), dec!(4), dec!(4), dec!(2)),
            compute_break_even_bps(dec!(5), dec!(5), dec!(4), dec!(3), dec!(3)),
        ];
        for bumped in bumps {
            assert!(bumped > base, "{bumped} should exceed {base}");
        }
    }

    #[test]
    fn test_maker_rebate_does_not_enter_taker_break_even() {
        // Maker rebate on the structure must not change the taker-path threshold.
        let mut fees = pair(dec!(5), dec!(10));
        fees.entry.maker_fee_bps = dec!(-1.5);
        let params = BreakEvenParams {
            fees,
            slippage_bps: dec!(10),
            latency_bps: dec!(0),
            buffer_bps: dec!(5),
        };
        assert_eq!(params.break_even_bps(), dec!(55));
    }

    #[test]
    fn test_edge_is_exact_subtraction() {
        assert_eq!(compute_edge_bps(dec!(80), dec!(55)), dec!(25));
        assert_eq!(compute_edge_bps(dec!(40), dec!(55)), dec!(-15));
        assert_eq!(compute_edge_bps(dec!(0.3), dec!(0.1)), dec!(0.2));
    }
}
