//! Dynamic edge-threshold calibration
//!
//! Instead of a hand-tuned minimum edge, the gate watches the net edges the
//! market actually produces during a warm-up window and then sets the bar at a
//! percentile of that distribution. The fallback chain guarantees the bar is
//! never unreachable: a calibrated threshold always admits at least one
//! historical sample.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::types::CalibrationConfig;

/// Bounded sample memory; old ticks age out of the distribution
const MAX_SAMPLES: usize = 4096;

/// Output of one calibration pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedThreshold {
    pub threshold_bps: Decimal,
    pub fallback_used: bool,
    /// Which rule produced the threshold, for observability
    pub reason: String,
    pub sample_count: usize,
}

/// What the gate says about one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDecision {
    /// Still warming up; everything passes while samples accumulate
    Warmup,
    Pass,
    Reject,
}

/// Warm-up percentile calibrator over observed net edges
#[derive(Debug)]
pub struct ThresholdCalibrator {
    cfg: CalibrationConfig,
    samples: VecDeque<Decimal>,
    started_at: Option<DateTime<Utc>>,
}

impl ThresholdCalibrator {
    pub fn new(cfg: CalibrationConfig) -> Self {
        Self {
            cfg,
            samples: VecDeque::new(),
            started_at: None,
        }
    }

    /// Record a net-edge observation
    pub fn record(&mut self, net_edge_bps: Decimal, now: DateTime<Utc>) {
        self.started_at.get_or_insert(now);
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(net_edge_bps);
    }

    pub fn is_warmed_up(&self, now: DateTime<Utc>) -> bool {
        match self.started_at {
            Some(start) => (now - start).num_seconds() >= self.cfg.warmup_secs as i64,
            None => false,
        }
    }

    /// Gate a candidate: record it, then check it against the calibrated bar
    pub fn check(&mut self, net_edge_bps: Decimal, now: DateTime<Utc>) -> ThresholdDecision {
        self.record(net_edge_bps, now);
        if !self.is_warmed_up(now) {
            return ThresholdDecision::Warmup;
        }
        let calibrated = self.calibrate();
        if net_edge_bps >= calibrated.threshold_bps {
            ThresholdDecision::Pass
        } else {
            ThresholdDecision::Reject
        }
    }

    /// Compute the current threshold with the full fallback chain
    pub fn calibrate(&self) -> CalibratedThreshold {
        let mut sorted: Vec<Decimal> = self.samples.iter().copied().collect();
        sorted.sort();
        let n = sorted.len();

        if n == 0 || n < self.cfg.min_samples {
            // Too little history to trust a percentile. Admit everything seen
            // so far rather than inventing a bar.
            let threshold_bps = sorted.first().copied().unwrap_or(self.cfg.min_edge_bps);
            return CalibratedThreshold {
                threshold_bps,
                fallback_used: true,
                reason: "insufficient_samples".to_string(),
                sample_count: n,
            };
        }

        let primary = percentile(&sorted, self.cfg.percentile).max(self.cfg.min_edge_bps);
        if pass_rate(&sorted, primary) >= self.cfg.min_pass_rate {
            return CalibratedThreshold {
                threshold_bps: primary,
                fallback_used: false,
                reason: "percentile".to_string(),
                sample_count: n,
            };
        }

        // Primary bar admits too little; relax to the quantile that would pass
        // exactly min_pass_rate of history.
        let relaxed = percentile(&sorted, 1.0 - self.cfg.min_pass_rate);
        if passes(&sorted, relaxed) > 0 {
            return CalibratedThreshold {
                threshold_bps: relaxed,
                fallback_used: true,
                reason: "min_pass_rate_quantile".to_string(),
                sample_count: n,
            };
        }

        // Zero-pass guard: the minimum observed sample is always reachable.
        CalibratedThreshold {
            threshold_bps: sorted[0],
            fallback_used: true,
            reason: "zero_pass_guard".to_string(),
            sample_count: n,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Nearest-rank percentile over sorted samples; `p` in [0, 1]
fn percentile(sorted: &[Decimal], p: f64) -> Decimal {
    debug_assert!(!sorted.is_empty());
    let rank = (p.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn passes(sorted: &[Decimal], threshold: Decimal) -> usize {
    sorted.iter().filter(|s| **s >= threshold).count()
}

fn pass_rate(sorted: &[Decimal], threshold: Decimal) -> f64 {
    passes(sorted, threshold) as f64 / sorted.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn cfg() -> CalibrationConfig {
        CalibrationConfig {
            enabled: true,
            warmup_secs: 60,
            percentile: 0.75,
            min_edge_bps: dec!(2),
            min_pass_rate: 0.10,
            min_samples: 5,
        }
    }

    #[test]
    fn test_everything_passes_during_warmup() {
        let mut cal = ThresholdCalibrator::new(cfg());
        let t0 = Utc::now();
        assert_eq!(cal.check(dec!(-50), t0), ThresholdDecision::Warmup);
        assert_eq!(
            cal.check(dec!(1), t0 + Duration::seconds(30)),
            ThresholdDecision::Warmup
        );
    }

    #[test]
    fn test_insufficient_samples_falls_back() {
        let mut cal = ThresholdCalibrator::new(cfg());
        let t0 = Utc::now();
        cal.record(dec!(5), t0);
        cal.record(dec!(8), t0);
        let c = cal.calibrate();
        assert!(c.fallback_used);
        assert_eq!(c.reason, "insufficient_samples");
        // Admits the smallest historical sample
        assert!(c.threshold_bps <= dec!(5));
    }

    #[test]
    fn test_percentile_threshold_after_warmup() {
        let mut cal = ThresholdCalibrator::new(cfg());
        let t0 = Utc::now();
        for edge in [dec!(1), dec!(2), dec!(3), dec!(4), dec!(5), dec!(6), dec!(7), dec!(8)] {
            cal.record(edge, t0);
        }
        let c = cal.calibrate();
        assert!(!c.fallback_used);
        assert_eq!(c.reason, "percentile");
        // p75 nearest-rank of 8 samples = 6th value = 6
        assert_eq!(c.threshold_bps, dec!(6));
        assert_eq!(c.sample_count, 8);
    }

    #[test]
    fn test_floor_applies_to_percentile() {
        let mut cal = ThresholdCalibrator::new(cfg());
        let t0 = Utc::now();
        for edge in [dec!(-3), dec!(-2), dec!(-1), dec!(0), dec!(3), dec!(4), dec!(5), dec!(6)] {
            cal.record(edge, t0);
        }
        let c = cal.calibrate();
        // p75 = 4, above the 2 bps floor; floor would win if percentile dipped below
        assert_eq!(c.threshold_bps, dec!(4));
    }

    #[test]
    fn test_all_samples_below_floor_uses_fallback_chain() {
        let mut cal = ThresholdCalibrator::new(cfg());
        let t0 = Utc::now();
        for edge in [dec!(-9), dec!(-8), dec!(-7), dec!(-6), dec!(-5), dec!(-4)] {
            cal.record(edge, t0);
        }
        let c = cal.calibrate();
        assert!(c.fallback_used);
        // The relaxed quantile still admits history here
        assert_eq!(c.reason, "min_pass_rate_quantile");
        let admitted = [dec!(-9), dec!(-8), dec!(-7), dec!(-6), dec!(-5), dec!(-4)]
            .iter()
            .filter(|s| **s >= c.threshold_bps)
            .count();
        assert!(admitted >= 1, "calibrated threshold must admit history");
    }

    #[test]
    fn test_calibrated_threshold_gates_candidates() {
        let mut cal = ThresholdCalibrator::new(cfg());
        let t0 = Utc::now();
        for edge in [dec!(1), dec!(2), dec!(3), dec!(4), dec!(5), dec!(6), dec!(7), dec!(8)] {
            cal.record(edge, t0);
        }
        let later = t0 + Duration::seconds(61);
        assert_eq!(cal.check(dec!(9), later), ThresholdDecision::Pass);
        assert_eq!(cal.check(dec!(1), later), ThresholdDecision::Reject);
    }
}
