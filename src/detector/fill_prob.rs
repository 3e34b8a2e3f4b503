//! Maker fill-probability model
//!
//! Resting an order earns the maker fee (or rebate) but may never fill; the
//! model prices that risk so the maker path can be compared against the taker
//! path on the same bps scale. Everything here is fixed-point decimal because
//! these figures feed fee and rebate accounting where float rounding compounds
//! across thousands of ticks.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Starting probability before penalties
const BASE_FILL_PROB: Decimal = dec!(0.70);
/// Clamp bounds for the final probability
const MIN_FILL_PROB: Decimal = dec!(0.30);
const MAX_FILL_PROB: Decimal = dec!(0.95);
/// Queue-position penalty: weight and cap
const QUEUE_PENALTY_WEIGHT: Decimal = dec!(0.30);
const QUEUE_PENALTY_CAP: Decimal = dec!(0.20);
/// Size penalty applies when the order exceeds this share of book depth
const SIZE_RATIO_THRESHOLD: Decimal = dec!(0.20);
const SIZE_PENALTY_WEIGHT: Decimal = dec!(0.50);
const SIZE_PENALTY_CAP: Decimal = dec!(0.25);
/// Volatility penalty applies above this threshold
const VOLATILITY_THRESHOLD_BPS: Decimal = dec!(10);
const VOLATILITY_PENALTY_WEIGHT: Decimal = dec!(0.01);
const VOLATILITY_PENALTY_CAP: Decimal = dec!(0.15);

/// Maker-path estimate attached to a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakerEstimate {
    pub fill_probability: Decimal,
    pub opportunity_cost_bps: Decimal,
    pub net_edge_bps: Decimal,
}

/// Maker fill-probability estimator
#[derive(Debug, Clone, Default)]
pub struct MakerFillModel;

impl MakerFillModel {
    /// Probability a resting order of `order_size` fills
    ///
    /// `queue_position` is the fraction of resting depth ahead of us (0 = front
    /// of queue), `volatility_bps` a short-horizon realized volatility.
    pub fn estimate_fill_probability(
        &self,
        depth: Decimal,
        order_size: Decimal,
        queue_position: Decimal,
        volatility_bps: Decimal,
    ) -> Decimal {
        let mut prob = BASE_FILL_PROB;

        prob -= (QUEUE_PENALTY_WEIGHT * queue_position).min(QUEUE_PENALTY_CAP);

        if depth > Decimal::ZERO {
            let ratio = order_size / depth;
            if ratio > SIZE_RATIO_THRESHOLD {
                prob -= (SIZE_PENALTY_WEIGHT * (ratio - SIZE_RATIO_THRESHOLD))
                    .min(SIZE_PENALTY_CAP);
            }
        }

        if volatility_bps > VOLATILITY_THRESHOLD_BPS {
            prob -= (VOLATILITY_PENALTY_WEIGHT * (volatility_bps - VOLATILITY_THRESHOLD_BPS))
                .min(VOLATILITY_PENALTY_CAP);
        }

        prob.clamp(MIN_FILL_PROB, MAX_FILL_PROB)
    }

    /// Cost of the fills that never happen
    ///
    /// While the order rests unfilled the market drifts away at
    /// `slippage_bps_per_second`; weight that drift by the non-fill probability.
    pub fn calculate_opportunity_cost_bps(
        &self,
        fill_probability: Decimal,
        wait_seconds: Decimal,
        slippage_bps_per_second: Decimal,
    ) -> Decimal {
        (Decimal::ONE - fill_probability) * wait_seconds * slippage_bps_per_second
    }

    /// Net edge of the maker path for a candidate spread
    pub fn estimate_maker_net_edge_bps(
        &self,
        spread_bps: Decimal,
        maker_fee_bps: Decimal,
        slippage_bps: Decimal,
        latency_bps: Decimal,
        opportunity_cost_bps: Decimal,
    ) -> Decimal {
        spread_bps - maker_fee_bps - slippage_bps - latency_bps - opportunity_cost_bps
    }
}
