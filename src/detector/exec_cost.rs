//! Execution-quality cost model
//!
//! Linear three-term estimate of what crossing two books actually costs over
//! the idealized mid-to-mid spread. Raw edge minus this total is the figure
//! profitability is decided on whenever a breakdown is attached.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::types::ExecCostConfig;

/// Version tag recorded on every breakdown this model emits
pub const MODEL_VERSION: &str = "exec-cost/v1";

/// Per-candidate execution cost estimate, all bps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCostBreakdown {
    /// Both legs pay the taker spread
    pub spread_cost_bps: Decimal,
    /// Linear in order size vs. resting depth, capped
    pub slippage_cost_bps: Decimal,
    /// Fixed penalty once the order is large relative to depth
    pub partial_fill_risk_bps: Decimal,
    pub total_exec_cost_bps: Decimal,
    pub net_edge_after_exec_bps: Decimal,
    pub model_version: String,
}

/// Execution-cost estimator
#[derive(Debug, Clone)]
pub struct ExecCostModel {
    cfg: ExecCostConfig,
}

impl ExecCostModel {
    pub fn new(cfg: ExecCostConfig) -> Self {
        Self { cfg }
    }

    /// Estimate the cost of executing `notional` against books averaging
    /// `avg_top_size` per level; None means no depth data was available.
    pub fn estimate(
        &self,
        raw_edge_bps: Decimal,
        notional: Decimal,
        avg_top_size: Option<Decimal>,
    ) -> ExecutionCostBreakdown {
        let (slippage_cost_bps, partial_fill_risk_bps) = match avg_top_size {
            Some(avg) if avg > Decimal::ZERO => {
                let ratio = notional / avg;
                let slippage = (self.cfg.slippage_alpha * ratio).min(self.cfg.slippage_cap_bps);
                let partial = if ratio > self.cfg.safe_size_ratio {
                    self.cfg.partial_fill_risk_bps
                } else {
                    Decimal::ZERO
                };
                (slippage, partial)
            }
            // No book data: conservative flat penalty, and size risk unknown
            _ => (self.cfg.no_depth_penalty_bps, Decimal::ZERO),
        };

        let total_exec_cost_bps =
            self.cfg.spread_cost_bps + slippage_cost_bps + partial_fill_risk_bps;
        ExecutionCostBreakdown {
            spread_cost_bps: self.cfg.spread_cost_bps,
            slippage_cost_bps,
            partial_fill_risk_bps,
            total_exec_cost_bps,
            net_edge_after_exec_bps: raw_edge_bps - total_exec_cost_bps,
            model_version: MODEL_VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn model() -> ExecCostModel {
        ExecCostModel::new(ExecCostConfig::default())
    }

    #[test]
    fn test_small_order_pays_spread_only() {
        // notional/avg = 0.1, slippage = 10 * 0.1 = 1 bps, below safe ratio
        let b = model().estimate(dec!(50), dec!(1), Some(dec!(10)));
        assert_eq!(b.spread_cost_bps, dec!(4));
        assert_eq!(b.slippage_cost_bps, dec!(1));
        assert_eq!(b.partial_fill_risk_bps, dec!(0));
        assert_eq!(b.total_exec_cost_bps, dec!(5));
        assert_eq!(b.net_edge_after_exec_bps, dec!(45));
        assert_eq!(b.model_version, MODEL_VERSION);
    }

    #[test]
    fn test_large_order_hits_cap_and_partial_risk() {
        // notional/avg = 20: slippage would be 200, capped at 100; ratio > 0.5
        let b = model().estimate(dec!(50), dec!(20), Some(dec!(1)));
        assert_eq!(b.slippage_cost_bps, dec!(100));
        assert_eq!(b.partial_fill_risk_bps, dec!(15));
        assert_eq!(b.total_exec_cost_bps, dec!(119));
        assert_eq!(b.net_edge_after_exec_bps, dec!(-69));
    }

    #[test]
    fn test_no_depth_data_uses_flat_penalty() {
        let b = model().estimate(dec!(50), dec!(5), None);
        assert_eq!(b.slippage_cost_bps, dec!(20));
        assert_eq!(b.partial_fill_risk_bps, dec!(0));
        assert_eq!(b.total_exec_cost_bps, dec!(24));
    }

    #[test]
    fn test_zero_avg_size_treated_as_no_depth() {
        let b = model().estimate(dec!(50), dec!(5), Some(dec!(0)));
        assert_eq!(b.slippage_cost_bps, dec!(20));
    }

    #[test]
    fn test_cost_monotone_in_notional() {
        let m = model();
        let avg = Some(dec!(2));
        let mut last = Decimal::MIN;
        for notional in [dec!(0.1), dec!(0.5), dec!(1), dec!(2), dec!(5), dec!(50)] {
            let total = m.estimate(dec!(0), notional, avg).total_exec_cost_bps;
            assert!(total >= last, "cost decreased at notional {notional}");
            last = total;
        }
    }
}
