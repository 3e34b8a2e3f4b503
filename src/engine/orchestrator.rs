//! The tick loop
//!
//! One synchronous pipeline per tick: control gate, per-symbol opportunity
//! generation, cross-symbol rank cut, intent building, simulated execution
//! with exit-quantity sync, PnL welding, KPI commit. The watcher runs beside
//! it on its own heartbeat and both observe the same cooperative stop flag.
//! Shutdown always flushes evidence atomically, whatever the cause.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::stop::{StopCause, StopFlag};
use crate::common::types::RejectReason;
use crate::config::types::AppConfig;
use crate::control::admin::{ControlMode, ControlStore};
use crate::detector::obi::candidate_rank_key;
use crate::detector::source::{Opportunity, OpportunitySource, SourceEvent};
use crate::engine::ledger::{verify_insert_counts, Ledger};
use crate::evidence::{config_fingerprint, EvidenceWriter};
use crate::execution::intent::IntentBuilder;
use crate::execution::pnl::PnlWelder;
use crate::execution::simulator::FillSimulator;
use crate::metrics::kpi::KpiHandle;
use crate::watcher::run_watcher::watcher_with_stop_flag;

/// Everything a run needs, wired once at startup
pub struct Engine {
    cfg: AppConfig,
    source: OpportunitySource,
    builder: IntentBuilder,
    simulator: FillSimulator,
    welder: PnlWelder,
    kpi: KpiHandle,
    ledger: Arc<dyn Ledger>,
    control: ControlStore,
    evidence: EvidenceWriter,
    stop: StopFlag,
}

impl Engine {
    pub fn new(cfg: AppConfig, source: OpportunitySource, ledger: Arc<dyn Ledger>) -> Result<Self> {
        let evidence = EvidenceWriter::new(&cfg.engine.run_dir)?;
        let control = ControlStore::new(&cfg.engine.run_dir)?;
        let simulator = FillSimulator::new(
            cfg.simulator.clone(),
            cfg.break_even.slippage_bps,
            cfg.break_even.latency_bps,
            cfg.engine.seed,
        );
        Ok(Self {
            builder: IntentBuilder::new(cfg.engine.quote_notional_krw),
            simulator,
            welder: PnlWelder,
            kpi: KpiHandle::new(Utc::now()),
            ledger,
            control,
            evidence,
            stop: StopFlag::new(),
            source,
            cfg,
        })
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn kpi(&self) -> KpiHandle {
        self.kpi.clone()
    }

    /// Run to completion; returns the stop cause whose exit code the process
    /// should report
    pub async fn run(mut self) -> Result<StopCause> {
        info!(
            run_mode = ?self.cfg.engine.run_mode,
            symbols = ?self.cfg.engine.symbols,
            run_dir = %self.evidence.dir().display(),
            "engine starting"
        );

        spawn_signal_handler(self.stop.clone());

        let watcher = watcher_with_stop_flag(self.cfg.watcher.clone(), self.stop.clone());
        let watcher_handle = tokio::spawn(watcher.run(
            self.kpi.clone(),
            self.evidence.clone(),
            self.stop.clone(),
        ));

        let run_started = Instant::now();
        let tick_interval = Duration::from_millis(self.cfg.engine.tick_interval_ms);
        let mut ticks: u64 = 0;

        loop {
            if self.stop.is_set() {
                break;
            }

            match self.control_gate()? {
                ControlMode::Running => {}
                ControlMode::Paused => {
                    debug!("paused; skipping tick");
                    self.sleep_or_stop(tick_interval).await;
                    continue;
                }
                // Stopping and the terminal modes all end the run
                _ => {
                    self.stop.trigger(StopCause::AdminStop);
                    break;
                }
            }

            let tick_started = Instant::now();
            self.tick().await;
            self.kpi
                .record_tick_latency(tick_started.elapsed().as_secs_f64() * 1_000.0);

            ticks += 1;
            if self.cfg.engine.max_ticks > 0 && ticks >= self.cfg.engine.max_ticks {
                self.stop.trigger(StopCause::Completed);
                break;
            }
            self.sleep_or_stop(tick_interval).await;
        }

        let cause = self.stop.cause().unwrap_or(StopCause::Completed);
        info!(?cause, ticks, "engine stopping; flushing evidence");

        // Drain the watcher first so its final heartbeat lands before the
        // manifest hashes the artifacts
        self.stop.trigger(StopCause::Completed);
        let _ = watcher_handle.await;

        self.flush_evidence(ticks, run_started, &cause)?;
        Ok(cause)
    }

    /// Read the externally-mutable control state once per tick
    fn control_gate(&self) -> Result<ControlMode> {
        Ok(self.control.load()?.mode)
    }

    async fn sleep_or_stop(&self, interval: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.stop.wait() => {}
        }
    }

    /// One pass over every active symbol
    async fn tick(&mut self) {
        let blacklist = match self.control.load() {
            Ok(state) => state.blacklist,
            Err(e) => {
                warn!("control state unreadable, trading all symbols: {e}");
                Default::default()
            }
        };

        let mut opportunities: Vec<Opportunity> = Vec::new();
        let symbols: Vec<String> = self
            .cfg
            .engine
            .symbols
            .iter()
            .filter(|s| !blacklist.contains(*s))
            .cloned()
            .collect();

        for symbol in &symbols {
            match self.source.generate(symbol).await {
                Ok(SourceEvent::Opportunity(opp)) => {
                    self.kpi.record_opportunity();
                    self.kpi.set_fx_provenance(format!(
                        "{} {}->{} rate {} at {}",
                        opp.fx.provider,
                        opp.fx.from,
                        opp.fx.to,
                        opp.fx.rate,
                        opp.fx.fetched_at.to_rfc3339()
                    ));
                    opportunities.push(*opp);
                }
                Ok(SourceEvent::Reject(reason)) => self.kpi.record_reject(reason),
                Err(e) => warn!(symbol = %symbol, "source failure: {e}"),
            }
        }

        // Cross-symbol top-K rank cut
        let top_k = self.cfg.obi.top_k;
        if top_k > 0 && opportunities.len() > top_k {
            opportunities.sort_by(|a, b| {
                candidate_rank_key(&b.candidate).cmp(&candidate_rank_key(&a.candidate))
            });
            for dropped in opportunities.split_off(top_k) {
                debug!(symbol = %dropped.candidate.symbol, "dropped by rank cut");
                self.kpi.record_reject(RejectReason::RankCut);
            }
        }
        for (rank, opp) in opportunities.iter_mut().enumerate() {
            opp.candidate.obi_rank = Some(rank);
        }

        for opportunity in opportunities {
            if let Err(e) = self.trade(&opportunity) {
                // Contract violations kill the pair, never the run
                warn!(symbol = %opportunity.candidate.symbol, "trade aborted: {e}");
            }
        }
    }

    /// Build, execute, and weld one pair
    fn trade(&mut self, opportunity: &Opportunity) -> Result<()> {
        let candidate = &opportunity.candidate;
        let Some(mut pair) = self.builder.build_pair(candidate) else {
            self.kpi.record_reject(RejectReason::NotProfitable);
            return Ok(());
        };
        self.kpi.record_intents(2);

        let buy_ref = candidate
            .buy_price()
            .ok_or_else(|| EngineError::ContractViolation("intent pair without direction".into()))?;
        let sell_ref = candidate
            .sell_price()
            .ok_or_else(|| EngineError::ContractViolation("intent pair without direction".into()))?;

        let entry_fee_bps = self.taker_fee_bps(&pair.entry.exchange);
        let exit_fee_bps = self.taker_fee_bps(&pair.exit.exchange);

        let entry_fill = self.simulator.execute(&pair.entry, buy_ref, entry_fee_bps)?;
        if entry_fill.rejected {
            self.kpi.record_reject(RejectReason::SimulatedReject);
            return Ok(());
        }
        self.kpi.record_execution();
        self.ledger.record_order_and_fill(&pair.entry, &entry_fill);

        // The hard contract: the exit leg trades exactly what the entry filled
        pair.exit.sync_exit_quantity(entry_fill.filled_qty)?;
        let exit_fill = self.simulator.execute(&pair.exit, sell_ref, exit_fee_bps)?;
        if exit_fill.rejected {
            self.kpi.record_reject(RejectReason::SimulatedReject);
            return Ok(());
        }
        self.kpi.record_execution();
        self.ledger.record_order_and_fill(&pair.exit, &exit_fill);

        match self.welder.weld(
            &candidate.symbol,
            &entry_fill,
            &exit_fill,
            buy_ref,
            sell_ref,
            opportunity.buy_book(),
            opportunity.sell_book(),
        ) {
            Ok(pnl) => {
                debug!(
                    symbol = %pnl.symbol,
                    net = %pnl.net_pnl_full,
                    "pair closed"
                );
                self.kpi.record_trade(&pnl);
                self.ledger.record_trade_complete(&pnl);
            }
            Err(EngineError::QuantityMismatch { .. }) => {
                self.kpi.record_reject(RejectReason::QtyMismatch);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn taker_fee_bps(&self, exchange: &str) -> Decimal {
        if exchange == self.cfg.venue_a.name {
            self.cfg.venue_a.taker_fee_bps
        } else {
            self.cfg.venue_b.taker_fee_bps
        }
    }

    /// Atomic end-of-run artifact flush; manifest is written last so it
    /// covers everything else
    fn flush_evidence(&self, ticks: u64, run_started: Instant, cause: &StopCause) -> Result<()> {
        let counts = self.ledger.get_counts();
        let pre = self.kpi.snapshot();
        if !verify_insert_counts(&counts, pre.closed_trades) {
            warn!(
                ?counts,
                closed_trades = pre.closed_trades,
                "ledger insert-count invariant violated"
            );
            self.kpi.degrade_db_integrity();
        }

        let snapshot = self.kpi.snapshot();
        self.evidence.write_kpi(&snapshot)?;
        self.evidence.write_decision_trace(&snapshot)?;

        let expected_secs = if self.cfg.engine.max_ticks > 0 {
            (self.cfg.engine.max_ticks * self.cfg.engine.tick_interval_ms) as f64 / 1_000.0
        } else {
            run_started.elapsed().as_secs_f64()
        };
        let stop_reason = match cause {
            StopCause::GuardTrip(reason) => Some(reason.as_str()),
            StopCause::Signal => Some("signal"),
            StopCause::AdminStop => Some("admin_stop"),
            StopCause::Completed => None,
        };
        self.evidence.write_watch_summary(
            expected_secs,
            run_started.elapsed().as_secs_f64(),
            stop_reason,
        )?;

        let report = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "run_mode": self.cfg.engine.run_mode,
            "symbols": self.cfg.engine.symbols,
            "venue_a": self.cfg.venue_a.name,
            "venue_b": self.cfg.venue_b.name,
            "ticks_completed": ticks,
            "stop_cause": stop_reason.unwrap_or("completed"),
            "config_fingerprint": config_fingerprint(&self.cfg)?,
            "closed_trades": snapshot.closed_trades,
            "net_pnl_total": snapshot.net_pnl_total,
            "winrate": snapshot.winrate,
            "reject_total": snapshot.reject_total,
            "ledger_counts": {
                "orders": counts.orders,
                "fills": counts.fills,
                "trades": counts.trades,
            },
            "db_integrity_ok": snapshot.db_integrity_ok,
        });
        self.evidence.write_json(crate::evidence::ENGINE_REPORT_FILE, &report)?;

        self.evidence.write_manifest()?;
        Ok(())
    }
}

/// Termination signals set the cooperative flag; nothing is cancelled
/// mid-tick and the loops exit within one iteration.
fn spawn_signal_handler(stop: StopFlag) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("termination signal received");
        stop.trigger(StopCause::Signal);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::source::MockOpportunitySource;
    use crate::engine::ledger::InMemoryLedger;

    fn test_config(tag: &str, ticks: u64) -> AppConfig {
        let mut cfg = AppConfig::paper_defaults();
        cfg.engine.max_ticks = ticks;
        cfg.engine.tick_interval_ms = 1;
        cfg.engine.run_dir = std::env::temp_dir()
            .join(format!("crossarb-engine-{tag}-{}", std::process::id()))
            .to_string_lossy()
            .to_string();
        let _ = std::fs::remove_dir_all(&cfg.engine.run_dir);
        cfg.watcher.poll_interval_secs = 1;
        // Short deterministic runs must not race the governor's guards
        cfg.watcher.zero_win_min_trades = 1_000_000;
        cfg.watcher.max_consecutive_losses = 1_000_000;
        cfg.watcher.winrate_min_trades = 1_000_000;
        cfg.watcher.starvation_min_opportunities = 1_000_000;
        cfg.watcher.max_drawdown_pct = 1_000.0;
        cfg
    }

    fn engine(cfg: &AppConfig) -> Engine {
        let source = OpportunitySource::Mock(MockOpportunitySource::new(cfg).unwrap());
        Engine::new(cfg.clone(), source, Arc::new(InMemoryLedger::new())).unwrap()
    }

    #[tokio::test]
    async fn test_run_completes_after_max_ticks() {
        let cfg = test_config("complete", 5);
        let cause = engine(&cfg).run().await.unwrap();
        assert_eq!(cause, StopCause::Completed);
        assert_eq!(cause.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_run_writes_evidence() {
        let cfg = test_config("evidence", 5);
        engine(&cfg).run().await.unwrap();

        let dir = std::path::Path::new(&cfg.engine.run_dir);
        for file in [
            crate::evidence::KPI_FILE,
            crate::evidence::DECISION_TRACE_FILE,
            crate::evidence::WATCH_SUMMARY_FILE,
            crate::evidence::ENGINE_REPORT_FILE,
            crate::evidence::MANIFEST_FILE,
        ] {
            assert!(dir.join(file).exists(), "{file} missing");
        }
    }

    #[tokio::test]
    async fn test_reject_invariant_holds_after_run() {
        let cfg = test_config("invariant", 10);
        let engine = engine(&cfg);
        let kpi = engine.kpi();
        engine.run().await.unwrap();

        let snap = kpi.snapshot();
        assert_eq!(
            snap.reject_total,
            snap.reject_reasons.values().sum::<u64>()
        );
    }

    #[tokio::test]
    async fn test_admin_stop_ends_run() {
        let cfg = test_config("admin-stop", 0);
        // Pre-set the control state to stopping before the engine starts
        let store = ControlStore::new(&cfg.engine.run_dir).unwrap();
        store
            .apply(
                crate::control::admin::ControlCommand::Stop,
                "test",
                "shutdown requested",
            )
            .unwrap();

        let cause = engine(&cfg).run().await.unwrap();
        assert_eq!(cause, StopCause::AdminStop);
        assert_ne!(cause.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_blacklisted_symbol_is_skipped() {
        let cfg = test_config("blacklist", 3);
        let store = ControlStore::new(&cfg.engine.run_dir).unwrap();
        store
            .apply(
                crate::control::admin::ControlCommand::BlacklistAdd("BTC".to_string()),
                "test",
                "bad feed",
            )
            .unwrap();
        store
            .apply(
                crate::control::admin::ControlCommand::BlacklistAdd("ETH".to_string()),
                "test",
                "bad feed",
            )
            .unwrap();

        let engine = engine(&cfg);
        let kpi = engine.kpi();
        engine.run().await.unwrap();

        // Every symbol blacklisted: no opportunities at all
        assert_eq!(kpi.snapshot().opportunities, 0);
    }
}
