//! Process-wide KPI accumulator
//!
//! One `PaperMetrics` exists per run. The tick loop is its only writer; the
//! watcher thread sees it exclusively through [`KpiHandle::snapshot`], which
//! clones under the same lock every mutation takes. A snapshot is therefore a
//! single per-tick commit: no interleaved field reads, no torn combinations
//! like wins > closed_trades.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::common::types::RejectReason;
use crate::execution::pnl::TradePnl;
use crate::metrics::latency::{LatencyRing, LatencyStats};

/// The accumulator itself; owned by [`KpiHandle`]
#[derive(Debug)]
pub struct PaperMetrics {
    started_at: DateTime<Utc>,
    opportunities: u64,
    intents: u64,
    executions: u64,
    closed_trades: u64,
    wins: u64,
    losses: u64,
    loss_streak: u64,
    reject_reasons: BTreeMap<RejectReason, u64>,
    fees_total: Decimal,
    slippage_cost_total: Decimal,
    latency_cost_total: Decimal,
    partial_fill_penalty_total: Decimal,
    spread_cost_total: Decimal,
    gross_pnl_total: Decimal,
    net_pnl_total: Decimal,
    fx_provenance: Option<String>,
    db_integrity_ok: bool,
    tick_latency: LatencyRing,
}

impl PaperMetrics {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            opportunities: 0,
            intents: 0,
            executions: 0,
            closed_trades: 0,
            wins: 0,
            losses: 0,
            loss_streak: 0,
            reject_reasons: BTreeMap::new(),
            fees_total: Decimal::ZERO,
            slippage_cost_total: Decimal::ZERO,
            latency_cost_total: Decimal::ZERO,
            partial_fill_penalty_total: Decimal::ZERO,
            spread_cost_total: Decimal::ZERO,
            gross_pnl_total: Decimal::ZERO,
            net_pnl_total: Decimal::ZERO,
            fx_provenance: None,
            db_integrity_ok: true,
            tick_latency: LatencyRing::default(),
        }
    }

    fn record_trade(&mut self, pnl: &TradePnl) {
        self.closed_trades += 1;
        if pnl.is_win() {
            self.wins += 1;
            self.loss_streak = 0;
        } else {
            self.losses += 1;
            self.loss_streak += 1;
        }
        self.fees_total += pnl.fees_total;
        self.slippage_cost_total += pnl.slippage_cost;
        self.latency_cost_total += pnl.latency_cost;
        self.partial_fill_penalty_total += pnl.partial_fill_penalty;
        self.spread_cost_total += pnl.spread_cost;
        self.gross_pnl_total += pnl.gross_pnl;
        self.net_pnl_total += pnl.net_pnl_full;
    }

    fn reject_total(&self) -> u64 {
        self.reject_reasons.values().sum()
    }

    fn snapshot(&self, now: DateTime<Utc>) -> KpiSnapshot {
        let reject_reasons: BTreeMap<String, u64> = self
            .reject_reasons
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), *v))
            .collect();
        KpiSnapshot {
            taken_at: now,
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds().max(0),
            opportunities: self.opportunities,
            intents: self.intents,
            executions: self.executions,
            closed_trades: self.closed_trades,
            wins: self.wins,
            losses: self.losses,
            loss_streak: self.loss_streak,
            reject_total: self.reject_total(),
            reject_reasons,
            fees_total: self.fees_total,
            slippage_cost_total: self.slippage_cost_total,
            latency_cost_total: self.latency_cost_total,
            partial_fill_penalty_total: self.partial_fill_penalty_total,
            spread_cost_total: self.spread_cost_total,
            gross_pnl_total: self.gross_pnl_total,
            net_pnl_total: self.net_pnl_total,
            winrate: if self.closed_trades > 0 {
                self.wins as f64 / self.closed_trades as f64
            } else {
                0.0
            },
            avg_net_pnl_per_trade: if self.closed_trades > 0 {
                self.net_pnl_total / Decimal::from(self.closed_trades)
            } else {
                Decimal::ZERO
            },
            fx_provenance: self.fx_provenance.clone(),
            db_integrity_ok: self.db_integrity_ok,
            tick_latency: self.tick_latency.stats(),
        }
    }
}

/// Point-in-time, self-consistent view of the KPI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub taken_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub opportunities: u64,
    pub intents: u64,
    pub executions: u64,
    pub closed_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub loss_streak: u64,
    pub reject_total: u64,
    pub reject_reasons: BTreeMap<String, u64>,
    pub fees_total: Decimal,
    pub slippage_cost_total: Decimal,
    pub latency_cost_total: Decimal,
    pub partial_fill_penalty_total: Decimal,
    pub spread_cost_total: Decimal,
    pub gross_pnl_total: Decimal,
    pub net_pnl_total: Decimal,
    pub winrate: f64,
    pub avg_net_pnl_per_trade: Decimal,
    pub fx_provenance: Option<String>,
    pub db_integrity_ok: bool,
    pub tick_latency: LatencyStats,
}

/// Shared handle; every mutation and every snapshot takes the same lock
#[derive(Clone)]
pub struct KpiHandle {
    inner: Arc<Mutex<PaperMetrics>>,
}

impl KpiHandle {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PaperMetrics::new(started_at))),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut PaperMetrics) -> R) -> R {
        let mut guard = self.inner.lock().expect("kpi lock poisoned");
        f(&mut guard)
    }

    pub fn record_opportunity(&self) {
        self.with(|m| m.opportunities += 1);
    }

    pub fn record_reject(&self, reason: RejectReason) {
        self.with(|m| *m.reject_reasons.entry(reason).or_insert(0) += 1);
    }

    pub fn record_intents(&self, count: u64) {
        self.with(|m| m.intents += count);
    }

    pub fn record_execution(&self) {
        self.with(|m| m.executions += 1);
    }

    pub fn record_trade(&self, pnl: &TradePnl) {
        self.with(|m| m.record_trade(pnl));
    }

    pub fn record_tick_latency(&self, millis: f64) {
        self.with(|m| m.tick_latency.record(millis));
    }

    pub fn set_fx_provenance(&self, provenance: impl Into<String>) {
        self.with(|m| m.fx_provenance = Some(provenance.into()));
    }

    pub fn degrade_db_integrity(&self) {
        self.with(|m| m.db_integrity_ok = false);
    }

    pub fn snapshot(&self) -> KpiSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> KpiSnapshot {
        self.with(|m| m.snapshot(now))
    }
}
