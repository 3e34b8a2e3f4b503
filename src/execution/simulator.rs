//! Simulated order execution
//!
//! The simulator always fills against the order: buys print above the
//! reference price, sells below it, by the configured slippage plus latency
//! drift. Partial fills, adverse-slippage events, and outright rejects fire
//! under seeded probabilities so any run replays exactly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::Side;
use crate::config::types::SimulatorConfig;
use crate::execution::intent::{IntentSize, OrderIntent};

/// Outcome of one simulated order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillResult {
    pub filled_qty: Decimal,
    pub filled_price: Decimal,
    /// Fee charged on the filled notional, in price units
    pub fee: Decimal,
    /// Slippage component of the applied drift
    pub slippage_bps: Decimal,
    /// Total adverse drift applied to the reference price
    pub pessimistic_drift_bps: Decimal,
    /// Simulated venue round trip; observability only, never a PnL input
    pub latency_ms: u64,
    pub partial_fill_ratio: Decimal,
    pub rejected: bool,
}

impl FillResult {
    fn rejected() -> Self {
        Self {
            filled_qty: Decimal::ZERO,
            filled_price: Decimal::ZERO,
            fee: Decimal::ZERO,
            slippage_bps: Decimal::ZERO,
            pessimistic_drift_bps: Decimal::ZERO,
            latency_ms: 0,
            partial_fill_ratio: Decimal::ZERO,
            rejected: true,
        }
    }
}

/// Seeded fill simulator
pub struct FillSimulator {
    cfg: SimulatorConfig,
    slippage_bps: Decimal,
    latency_bps: Decimal,
    rng: ChaCha8Rng,
}

impl FillSimulator {
    pub fn new(cfg: SimulatorConfig, slippage_bps: Decimal, latency_bps: Decimal, seed: u64) -> Self {
        Self {
            cfg,
            slippage_bps,
            latency_bps,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Simulate executing `intent` against `reference_price`
    ///
    /// Fails fast on an unsynced exit leg; a simulated venue reject comes back
    /// as a `FillResult` with the reject flag, not an error.
    pub fn execute(
        &mut self,
        intent: &OrderIntent,
        reference_price: Decimal,
        taker_fee_bps: Decimal,
    ) -> Result<FillResult> {
        if !intent.is_ready() {
            return Err(EngineError::ContractViolation(format!(
                "{} {} intent executed before exit-quantity sync",
                intent.exchange, intent.side
            )));
        }
        if reference_price <= Decimal::ZERO {
            return Err(EngineError::ContractViolation(format!(
                "non-positive reference price {reference_price}"
            )));
        }

        if self.rng.gen::<f64>() < self.cfg.reject_prob {
            return Ok(FillResult::rejected());
        }

        let mut drift_bps = self.slippage_bps + self.latency_bps;
        if self.rng.gen::<f64>() < self.cfg.adverse_slip_prob {
            drift_bps += self.cfg.adverse_extra_bps;
        }

        // Price always moves against the order side
        let drift = reference_price * drift_bps / Decimal::from(10_000);
        let filled_price = match intent.side {
            Side::Buy => reference_price + drift,
            Side::Sell => reference_price - drift,
        };

        let partial_fill_ratio = if self.rng.gen::<f64>() < self.cfg.partial_fill_prob {
            let floor_bps = (self.cfg.partial_fill_floor * 10_000.0) as i64;
            Decimal::new(self.rng.gen_range(floor_bps..10_000), 4)
        } else {
            Decimal::ONE
        };

        let intended_qty = match intent.size {
            IntentSize::QuoteAmount(amount) => amount / filled_price,
            IntentSize::BaseQty(qty) => qty,
        };
        let filled_qty = intended_qty * partial_fill_ratio;
        let fee = filled_price * filled_qty * taker_fee_bps / Decimal::from(10_000);

        // Fixed latency with a little jitter, reported in milliseconds
        let jitter = self.cfg.latency_ms / 5;
        let latency_ms = if jitter > 0 {
            self.cfg.latency_ms + self.rng.gen_range(0..=jitter)
        } else {
            self.cfg.latency_ms
        };

        Ok(FillResult {
            filled_qty,
            filled_price,
            fee,
            slippage_bps: self.slippage_bps,
            pessimistic_drift_bps: drift_bps,
            latency_ms,
            partial_fill_ratio,
            rejected: false,
        })
    }
}
