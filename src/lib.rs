//! crossarb
//!
//! A cross-exchange crypto arbitrage paper-trading engine: it detects price
//! discrepancies between a KRW-settled domestic venue and a USDT-quoted
//! global venue, prices the full friction stack against the spread, simulates
//! paired fills, and continuously self-monitors with a safety governor that
//! halts the run on statistically suspicious or economically unsafe behavior.

pub mod common;
pub mod config;
pub mod control;
pub mod detector;
pub mod engine;
pub mod evidence;
pub mod execution;
pub mod market;
pub mod metrics;
pub mod pricing;
pub mod watcher;

// Re-export commonly used types
pub use common::errors::{EngineError, Result};
pub use common::stop::{StopCause, StopFlag};
pub use common::types::{Currency, OrderBook, OrderType, PriceLevel, RejectReason, Side, Ticker};
pub use config::types::{AppConfig, RunMode};
pub use control::admin::{ControlCommand, ControlMode, ControlState, ControlStore};
pub use detector::opportunity::{Direction, OpportunityCandidate};
pub use detector::source::{MockOpportunitySource, OpportunitySource, SourceEvent};
pub use engine::ledger::{InMemoryLedger, Ledger};
pub use engine::orchestrator::Engine;
pub use evidence::EvidenceWriter;
pub use execution::intent::{IntentBuilder, OrderIntent};
pub use execution::pnl::{PnlWelder, TradePnl};
pub use execution::simulator::{FillResult, FillSimulator};
pub use market::fx::{FixedFxProvider, FxProvider};
pub use market::provider::{MarketDataProvider, MockMarketProvider};
pub use metrics::kpi::{KpiHandle, KpiSnapshot};
pub use watcher::run_watcher::{RunWatcher, StopReason, WatcherState};
