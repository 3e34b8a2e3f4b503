use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::detector::exec_cost::ExecutionCostBreakdown;
use crate::detector::fill_prob::MakerEstimate;
use crate::pricing::fees::{compute_edge_bps, BreakEvenParams};

/// Which venue to buy on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Venue A is cheaper: buy A, sell B
    BuyASellB,
    /// Venue B is cheaper: buy B, sell A
    BuyBSellA,
    /// Prices are equal; nothing to do
    None,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::BuyASellB => write!(f, "buy_a_sell_b"),
            Direction::BuyBSellA => write!(f, "buy_b_sell_a"),
            Direction::None => write!(f, "none"),
        }
    }
}

/// One cross-venue price comparison, alive for a single tick
///
/// Immutable after creation except for the filter-annotation fields
/// (`obi_score`, `obi_rank`, `exec_cost`, `maker`), which the gate pipeline
/// fills in. `profitable` is private: [`Self::decide_profitability`] is the
/// only writer, and it runs on raw net edge OR exec-adjusted edge, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityCandidate {
    pub symbol: String,
    pub exchange_a: String,
    pub exchange_b: String,
    /// Venue A price normalized into KRW
    pub price_a: Decimal,
    /// Venue B price normalized into KRW
    pub price_b: Decimal,
    pub spread_bps: Decimal,
    pub break_even_bps: Decimal,
    pub edge_bps: Decimal,
    pub deterministic_drift_bps: Decimal,
    pub net_edge_bps: Decimal,
    pub direction: Direction,
    profitable: bool,
    pub obi_score: Option<Decimal>,
    pub obi_rank: Option<usize>,
    pub exec_cost: Option<ExecutionCostBreakdown>,
    pub maker: Option<MakerEstimate>,
    /// Build intents even when unprofitable (negative-edge experiments)
    pub allow_unprofitable: bool,
}

impl OpportunityCandidate {
    /// Compare two normalized prices for one symbol
    ///
    /// Returns None when either price is non-positive; price direction and all
    /// bps figures are derived here. The fresh candidate is profitability-
    /// decided on its raw net edge; attaching an execution-cost breakdown via
    /// [`Self::apply_exec_cost`] re-decides it on the adjusted edge.
    pub fn evaluate(
        symbol: impl Into<String>,
        exchange_a: impl Into<String>,
        exchange_b: impl Into<String>,
        price_a: Decimal,
        price_b: Decimal,
        params: &BreakEvenParams,
        deterministic_drift_bps: Decimal,
    ) -> Option<Self> {
        if price_a <= Decimal::ZERO || price_b <= Decimal::ZERO {
            return None;
        }

        let spread_bps = ((price_a - price_b) / price_b).abs() * Decimal::from(10_000);
        let break_even_bps = params.break_even_bps();
        let edge_bps = compute_edge_bps(spread_bps, break_even_bps);
        let net_edge_bps = edge_bps - deterministic_drift_bps;

        let direction = if price_a < price_b {
            Direction::BuyASellB
        } else if price_a > price_b {
            Direction::BuyBSellA
        } else {
            Direction::None
        };

        let mut candidate = Self {
            symbol: symbol.into(),
            exchange_a: exchange_a.into(),
            exchange_b: exchange_b.into(),
            price_a,
            price_b,
            spread_bps,
            break_even_bps,
            edge_bps,
            deterministic_drift_bps,
            net_edge_bps,
            direction,
            profitable: false,
            obi_score: None,
            obi_rank: None,
            exec_cost: None,
            maker: None,
            allow_unprofitable: false,
        };
        candidate.decide_profitability();
        Some(candidate)
    }

    /// Attach an execution-cost breakdown and re-decide profitability on the
    /// exec-adjusted edge
    pub fn apply_exec_cost(&mut self, breakdown: ExecutionCostBreakdown) {
        self.exec_cost = Some(breakdown);
        self.decide_profitability();
    }

    /// The single decision point for `profitable`
    ///
    /// Raw path: net edge > 0. Once an exec-cost breakdown exists the decision
    /// moves entirely to the adjusted edge, so a raw-positive candidate can
    /// flip to unprofitable under realistic execution cost.
    fn decide_profitability(&mut self) {
        self.profitable = match &self.exec_cost {
            Some(breakdown) => breakdown.net_edge_after_exec_bps > Decimal::ZERO,
            None => self.net_edge_bps > Decimal::ZERO,
        };
    }

    pub fn profitable(&self) -> bool {
        self.profitable
    }

    /// Venue to buy on and venue to sell on, or None for flat prices
    pub fn legs(&self) -> Option<(&str, &str)> {
        match self.direction {
            Direction::BuyASellB => Some((self.exchange_a.as_str(), self.exchange_b.as_str())),
            Direction::BuyBSellA => Some((self.exchange_b.as_str(), self.exchange_a.as_str())),
            Direction::None => None,
        }
    }

    /// Price on the venue being bought
    pub fn buy_price(&self) -> Option<Decimal> {
        match self.direction {
            Direction::BuyASellB => Some(self.price_a),
            Direction::BuyBSellA => Some(self.price_b),
            Direction::None => None,
        }
    }

    /// Price on the venue being sold
    pub fn sell_price(&self) -> Option<Decimal> {
        match self.direction {
            Direction::BuyASellB => Some(self.price_b),
            Direction::BuyBSellA => Some(self.price_a),
            Direction::None => None,
        }
    }
}
