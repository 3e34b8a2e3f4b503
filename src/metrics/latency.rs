//! Bounded latency sampling
//!
//! Per-tick latencies go into a fixed-size ring so a long run cannot grow the
//! KPI without bound; percentiles are nearest-rank over whatever the ring
//! currently holds.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default ring capacity
pub const DEFAULT_CAPACITY: usize = 4096;

/// Percentile summary of the ring's current contents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    fn empty() -> Self {
        Self {
            count: 0,
            p50_ms: 0.0,
            p90_ms: 0.0,
            p99_ms: 0.0,
            max_ms: 0.0,
        }
    }
}

/// Size-capped ring of latency samples in milliseconds
#[derive(Debug, Clone)]
pub struct LatencyRing {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, millis: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(millis);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Nearest-rank percentile; `p` in [0, 1]
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = (p.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
        Some(sorted[rank.saturating_sub(1).min(sorted.len() - 1)])
    }

    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::empty();
        }
        LatencyStats {
            count: self.samples.len(),
            p50_ms: self.percentile(0.50).unwrap_or(0.0),
            p90_ms: self.percentile(0.90).unwrap_or(0.0),
            p99_ms: self.percentile(0.99).unwrap_or(0.0),
            max_ms: self.samples.iter().copied().fold(0.0, f64::max),
        }
    }
}

impl Default for LatencyRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentiles() {
        let mut ring = LatencyRing::new(100);
        for i in 1..=100 {
            ring.record(i as f64);
        }
        assert_eq!(ring.percentile(0.50), Some(50.0));
        assert_eq!(ring.percentile(0.99), Some(99.0));
        let stats = ring.stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.max_ms, 100.0);
    }

    #[test]
    fn test_ring_is_bounded() {
        let mut ring = LatencyRing::new(10);
        for i in 0..50 {
            ring.record(i as f64);
        }
        assert_eq!(ring.len(), 10);
        // Only the most recent 10 survive
        assert_eq!(ring.percentile(0.0), Some(40.0));
    }

    #[test]
    fn test_empty_ring() {
        let ring = LatencyRing::new(10);
        assert!(ring.percentile(0.5).is_none());
        assert_eq!(ring.stats().count, 0);
    }
}
