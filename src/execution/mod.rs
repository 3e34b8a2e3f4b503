//! Order intents, simulated fills, and PnL welding

pub mod intent;
pub mod pnl;
pub mod simulator;

pub use intent::{IntentBuilder, IntentPair, IntentSize, OrderIntent, QtySource};
pub use pnl::{PnlWelder, TradePnl};
pub use simulator::{FillResult, FillSimulator};
