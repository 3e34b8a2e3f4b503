//! KPI accumulation and latency statistics

pub mod kpi;
pub mod latency;

pub use kpi::{KpiHandle, KpiSnapshot, PaperMetrics};
pub use latency::{LatencyRing, LatencyStats};
