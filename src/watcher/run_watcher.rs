//! RunWatcher: the kill-switch governor
//!
//! A background task polls a KPI snapshot on a fixed heartbeat and checks a
//! set of independent terminal guards. Any trip records a stop reason with a
//! diagnosis, persists a point-in-time snapshot artifact, and fires the stop
//! callback exactly once; subsequent polls keep appending heartbeats but can
//! never re-trip. Heartbeat density is the external liveness proof that this
//! task has not stalled.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::common::stop::{StopCause, StopFlag};
use crate::config::types::WatcherConfig;
use crate::evidence::EvidenceWriter;
use crate::metrics::kpi::{KpiHandle, KpiSnapshot};

/// Terminal failure causes, one per guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Guard A: enough closed trades, zero wins
    ZeroWin,
    /// Guard B: average PnL/trade negative for the whole window
    SustainedNegativeEdge,
    /// Guard D: drawdown from peak PnL beyond the limit
    MaxDrawdown,
    /// Guard E: loss streak at the limit
    ConsecutiveLosses,
    /// Guard F: winrate too good to be true
    ImplausibleWinrate,
    /// Guard G: trades closed but zero fees accumulated
    ZeroFriction,
    /// Opportunities flowing, no intents built
    TradeStarvation,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::ZeroWin => "zero_win",
            StopReason::SustainedNegativeEdge => "sustained_negative_edge",
            StopReason::MaxDrawdown => "max_drawdown",
            StopReason::ConsecutiveLosses => "consecutive_losses",
            StopReason::ImplausibleWinrate => "implausible_winrate",
            StopReason::ZeroFriction => "zero_friction",
            StopReason::TradeStarvation => "trade_starvation",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One guard trip with its free-text diagnosis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardTrip {
    pub reason: StopReason,
    pub diagnosis: String,
}

/// State owned exclusively by the watcher task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherState {
    pub peak_pnl: Decimal,
    /// Last loss streak observed in a snapshot, kept for diagnosis
    pub last_loss_streak: u64,
    pub negative_edge_since: Option<DateTime<Utc>>,
    pub starvation_since: Option<DateTime<Utc>>,
    pub stop_reason: Option<StopReason>,
    pub diagnosis: Option<String>,
}

impl WatcherState {
    fn new() -> Self {
        Self {
            peak_pnl: Decimal::ZERO,
            last_loss_streak: 0,
            negative_edge_since: None,
            starvation_since: None,
            stop_reason: None,
            diagnosis: None,
        }
    }

    pub fn tripped(&self) -> bool {
        self.stop_reason.is_some()
    }
}

type StopCallback = Box<dyn FnOnce(&GuardTrip) + Send>;

/// The governor
pub struct RunWatcher {
    cfg: WatcherConfig,
    state: WatcherState,
    stop_callback: Option<StopCallback>,
}

impl RunWatcher {
    pub fn new(cfg: WatcherConfig, stop_callback: StopCallback) -> Self {
        Self {
            cfg,
            state: WatcherState::new(),
            stop_callback: Some(stop_callback),
        }
    }

    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    /// Check every guard against one snapshot
    ///
    /// Returns the trip the first time a guard fires and never again; the
    /// snapshot is read exactly once per heartbeat, so every comparison here
    /// sees one consistent per-tick commit.
    pub fn evaluate(&mut self, snap: &KpiSnapshot, now: DateTime<Utc>) -> Option<GuardTrip> {
        if self.state.tripped() {
            return None;
        }

        self.state.peak_pnl = self.state.peak_pnl.max(snap.net_pnl_total);
        self.state.last_loss_streak = snap.loss_streak;

        // Guard B arms/disarms its rolling timer every poll
        if snap.closed_trades > 0 && snap.avg_net_pnl_per_trade < Decimal::ZERO {
            self.state.negative_edge_since.get_or_insert(now);
        } else {
            self.state.negative_edge_since = None;
        }

        // Starvation timer likewise
        if snap.opportunities >= self.cfg.starvation_min_opportunities && snap.intents == 0 {
            self.state.starvation_since.get_or_insert(now);
        } else {
            self.state.starvation_since = None;
        }

        let trip = self.check_guards(snap, now);
        if let Some(trip) = &trip {
            self.state.stop_reason = Some(trip.reason);
            self.state.diagnosis = Some(trip.diagnosis.clone());
            error!(reason = %trip.reason, "{}", trip.diagnosis);
        }
        trip
    }

    fn check_guards(&self, snap: &KpiSnapshot, now: DateTime<Utc>) -> Option<GuardTrip> {
        // A: zero wins over a meaningful sample
        if snap.closed_trades >= self.cfg.zero_win_min_trades && snap.wins == 0 {
            return Some(GuardTrip {
                reason: StopReason::ZeroWin,
                diagnosis: format!(
                    "{} trades closed with zero wins; edge model or execution is broken",
                    snap.closed_trades
                ),
            });
        }

        // B: sustained negative average PnL per trade
        if let Some(since) = self.state.negative_edge_since {
            let held_secs = (now - since).num_seconds();
            if held_secs >= self.cfg.negative_edge_window_secs as i64 {
                return Some(GuardTrip {
                    reason: StopReason::SustainedNegativeEdge,
                    diagnosis: format!(
                        "avg PnL/trade {} negative for {held_secs}s (limit {}s)",
                        snap.avg_net_pnl_per_trade, self.cfg.negative_edge_window_secs
                    ),
                });
            }
        }

        // D: drawdown from peak
        if self.state.peak_pnl > Decimal::ZERO {
            let drawdown = ((self.state.peak_pnl - snap.net_pnl_total) / self.state.peak_pnl)
                .to_f64()
                .unwrap_or(0.0);
            if drawdown >= self.cfg.max_drawdown_pct {
                return Some(GuardTrip {
                    reason: StopReason::MaxDrawdown,
                    diagnosis: format!(
                        "drawdown {:.1}% from peak {} to {} (limit {:.1}%)",
                        drawdown * 100.0,
                        self.state.peak_pnl,
                        snap.net_pnl_total,
                        self.cfg.max_drawdown_pct * 100.0
                    ),
                });
            }
        }

        // E: loss streak
        if snap.loss_streak >= self.cfg.max_consecutive_losses {
            return Some(GuardTrip {
                reason: StopReason::ConsecutiveLosses,
                diagnosis: format!(
                    "{} consecutive losses (limit {})",
                    snap.loss_streak, self.cfg.max_consecutive_losses
                ),
            });
        }

        // F: statistically implausible winrate signals a model bug
        if snap.closed_trades >= self.cfg.winrate_min_trades
            && snap.winrate >= self.cfg.winrate_cap
        {
            return Some(GuardTrip {
                reason: StopReason::ImplausibleWinrate,
                diagnosis: format!(
                    "winrate {:.1}% over {} trades is implausible; check friction accounting",
                    snap.winrate * 100.0,
                    snap.closed_trades
                ),
            });
        }

        // G: trades closed without any fee flow means friction was bypassed
        if snap.closed_trades > 0 && snap.fees_total == Decimal::ZERO {
            return Some(GuardTrip {
                reason: StopReason::ZeroFriction,
                diagnosis: format!(
                    "{} trades closed with fees_total = 0; friction pipeline bypassed",
                    snap.closed_trades
                ),
            });
        }

        // Starvation: the pipeline sees opportunities but never builds intents
        if let Some(since) = self.state.starvation_since {
            let held_secs = (now - since).num_seconds();
            if held_secs >= self.cfg.starvation_window_secs as i64 {
                return Some(GuardTrip {
                    reason: StopReason::TradeStarvation,
                    diagnosis: format!(
                        "{} opportunities with zero intents for {held_secs}s",
                        snap.opportunities
                    ),
                });
            }
        }

        None
    }

    /// Heartbeat loop; runs until the stop flag is set
    ///
    /// Every poll appends a heartbeat line whether or not anything tripped.
    /// On a trip the snapshot artifact is persisted before the stop callback
    /// fires, and the callback fires exactly once.
    pub async fn run(mut self, kpi: KpiHandle, evidence: EvidenceWriter, stop: StopFlag) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.cfg.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            poll_interval_secs = self.cfg.poll_interval_secs,
            "run watcher started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.wait() => break,
            }

            let snap = kpi.snapshot();
            if let Err(e) = evidence.append_heartbeat(&snap, self.state.tripped()) {
                warn!("heartbeat append failed: {e}");
            }

            if let Some(trip) = self.evaluate(&snap, Utc::now()) {
                let artifact = serde_json::json!({
                    "ts": Utc::now().to_rfc3339(),
                    "stop_reason": trip.reason.as_str(),
                    "diagnosis": trip.diagnosis,
                    "watcher_state": self.state.clone(),
                    "kpi": snap,
                });
                if let Err(e) = evidence.write_json(crate::evidence::STOP_REASON_FILE, &artifact) {
                    warn!("stop reason snapshot write failed: {e}");
                }
                if let Some(callback) = self.stop_callback.take() {
                    callback(&trip);
                }
            }
        }
        info!("run watcher stopped");
    }
}

/// Convenience constructor wiring the callback to a stop flag
pub fn watcher_with_stop_flag(cfg: WatcherConfig, stop: StopFlag) -> RunWatcher {
    RunWatcher::new(
        cfg,
        Box::new(move |trip| {
            stop.trigger(StopCause::GuardTrip(trip.reason.as_str().to_string()));
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::pnl::TradePnl;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cfg() -> WatcherConfig {
        WatcherConfig::default()
    }

    fn watcher() -> (RunWatcher, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let w = RunWatcher::new(
            cfg(),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (w, fired)
    }

    fn trade(net: Decimal, fee: Decimal) -> TradePnl {
        TradePnl {
            symbol: "BTC".to_string(),
            gross_pnl: net,
            fees_total: fee,
            slippage_cost: dec!(0),
            latency_cost: dec!(0),
            partial_fill_penalty: dec!(0),
            spread_cost: dec!(0),
            net_pnl_full: net,
            entry_latency_ms: 100,
            exit_latency_ms: 100,
        }
    }

    fn snapshot_with_trades(wins: u64, losses: u64) -> KpiSnapshot {
        let kpi = KpiHandle::new(Utc::now());
        for _ in 0..wins {
            kpi.record_trade(&trade(dec!(1_000), dec!(100)));
        }
        for _ in 0..losses {
            kpi.record_trade(&trade(dec!(-1_000), dec!(100)));
        }
        kpi.snapshot()
    }

    #[test]
    fn test_guard_f_trips_at_20_wins_not_19() {
        let now = Utc::now();

        let (mut w, fired) = watcher();
        let snap19 = snapshot_with_trades(19, 0);
        assert!(w.evaluate(&snap19, now).is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let (mut w, _) = watcher();
        let snap20 = snapshot_with_trades(20, 0);
        let trip = w.evaluate(&snap20, now).unwrap();
        assert_eq!(trip.reason, StopReason::ImplausibleWinrate);
    }

    #[test]
    fn test_guard_a_zero_win() {
        let (mut w, _) = watcher();
        let now = Utc::now();
        // 15 losses, zero wins; loss-streak guard would also apply but A runs first
        let snap = snapshot_with_trades(0, 15);
        let trip = w.evaluate(&snap, now).unwrap();
        assert_eq!(trip.reason, StopReason::ZeroWin);
    }

    #[test]
    fn test_guard_e_consecutive_losses() {
        let (mut w, _) = watcher();
        let now = Utc::now();
        // A win first so guard A stays quiet, then an 8-loss streak
        let kpi = KpiHandle::new(Utc::now());
        kpi.record_trade(&trade(dec!(1_000), dec!(100)));
        for _ in 0..8 {
            kpi.record_trade(&trade(dec!(-10), dec!(100)));
        }
        let snap = kpi.snapshot();
        let trip = w.evaluate(&snap, now).unwrap();
        assert_eq!(trip.reason, StopReason::ConsecutiveLosses);
    }

    #[test]
    fn test_guard_d_max_drawdown() {
        let (mut w, _) = watcher();
        let t0 = Utc::now();

        // Establish a peak, then collapse past the 50% limit
        let kpi = KpiHandle::new(t0);
        for _ in 0..4 {
            kpi.record_trade(&trade(dec!(1_000), dec!(100)));
        }
        assert!(w.evaluate(&kpi.snapshot(), t0).is_none());

        kpi.record_trade(&trade(dec!(-3_000), dec!(100)));
        let trip = w.evaluate(&kpi.snapshot(), t0).unwrap();
        assert_eq!(trip.reason, StopReason::MaxDrawdown);
    }

    #[test]
    fn test_guard_b_needs_sustained_window() {
        let (mut w, _) = watcher();
        let t0 = Utc::now();
        // One win keeps guards A/E quiet; net still negative on average
        let kpi = KpiHandle::new(t0);
        kpi.record_trade(&trade(dec!(100), dec!(50)));
        kpi.record_trade(&trade(dec!(-500), dec!(50)));
        let snap = kpi.snapshot();

        // First sight arms the timer, no trip
        assert!(w.evaluate(&snap, t0).is_none());
        // Still inside the window
        assert!(w
            .evaluate(&snap, t0 + ChronoDuration::seconds(100))
            .is_none());
        // Window elapsed
        let trip = w
            .evaluate(&snap, t0 + ChronoDuration::seconds(301))
            .unwrap();
        assert_eq!(trip.reason, StopReason::SustainedNegativeEdge);
    }

    #[test]
    fn test_guard_b_timer_disarms_on_recovery() {
        let (mut w, _) = watcher();
        let t0 = Utc::now();
        let kpi = KpiHandle::new(t0);
        kpi.record_trade(&trade(dec!(100), dec!(50)));
        kpi.record_trade(&trade(dec!(-500), dec!(50)));
        assert!(w.evaluate(&kpi.snapshot(), t0).is_none());

        // Recovery flips the average positive and disarms the timer
        kpi.record_trade(&trade(dec!(10_000), dec!(50)));
        assert!(w
            .evaluate(&kpi.snapshot(), t0 + ChronoDuration::seconds(400))
            .is_none());
        assert!(w.state().negative_edge_since.is_none());
    }

    #[test]
    fn test_guard_g_zero_friction() {
        let (mut w, _) = watcher();
        let now = Utc::now();
        let kpi = KpiHandle::new(now);
        kpi.record_trade(&trade(dec!(1_000), dec!(0)));
        let trip = w.evaluate(&kpi.snapshot(), now).unwrap();
        assert_eq!(trip.reason, StopReason::ZeroFriction);
    }

    #[test]
    fn test_starvation_guard() {
        let (mut w, _) = watcher();
        let t0 = Utc::now();
        let kpi = KpiHandle::new(t0);
        for _ in 0..60 {
            kpi.record_opportunity();
        }
        let snap = kpi.snapshot();
        assert!(w.evaluate(&snap, t0).is_none());
        let trip = w
            .evaluate(&snap, t0 + ChronoDuration::seconds(181))
            .unwrap();
        assert_eq!(trip.reason, StopReason::TradeStarvation);

        // Intents flowing would have disarmed it
        let (mut w2, _) = watcher();
        kpi.record_intents(2);
        assert!(w2.evaluate(&kpi.snapshot(), t0).is_none());
        assert!(w2
            .evaluate(&kpi.snapshot(), t0 + ChronoDuration::seconds(181))
            .is_none());
    }

    #[test]
    fn test_trip_is_terminal_and_callback_fires_once() {
        let (mut w, fired) = watcher();
        let now = Utc::now();
        let snap = snapshot_with_trades(20, 0);

        let trip = w.evaluate(&snap, now);
        assert!(trip.is_some());
        // The run loop invokes the callback; simulate it here
        if let (Some(trip), Some(cb)) = (trip, w.stop_callback.take()) {
            cb(&trip);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Repeated checks after the trip return nothing and cannot re-fire
        assert!(w.evaluate(&snap, now).is_none());
        assert!(w.evaluate(&snap, now + ChronoDuration::seconds(60)).is_none());
        assert!(w.state().tripped());
        assert_eq!(w.state().stop_reason, Some(StopReason::ImplausibleWinrate));
    }

    #[test]
    fn test_stop_flag_wiring() {
        let stop = StopFlag::new();
        let mut w = watcher_with_stop_flag(cfg(), stop.clone());
        let snap = snapshot_with_trades(20, 0);
        let trip = w.evaluate(&snap, Utc::now()).unwrap();
        if let Some(cb) = w.stop_callback.take() {
            cb(&trip);
        }
        assert!(stop.is_set());
        assert_eq!(
            stop.cause(),
            Some(StopCause::GuardTrip("implausible_winrate".to_string()))
        );
    }
}
