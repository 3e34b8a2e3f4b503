//! Engine wiring: tick loop, ledger seam, shutdown

pub mod ledger;
pub mod orchestrator;

pub use ledger::{verify_insert_counts, InMemoryLedger, Ledger, LedgerCounts};
pub use orchestrator::Engine;
