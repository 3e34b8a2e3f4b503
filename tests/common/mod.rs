//! Common test utilities and fixtures
#![allow(dead_code)]

use chrono::Utc;
use crossarb::common::types::{Currency, OrderBook, PriceLevel};
use crossarb::config::types::AppConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Paper config pointed at a throwaway run directory with governor guards
/// relaxed, so short deterministic runs cannot race the watcher.
pub fn test_config(tag: &str) -> AppConfig {
    let mut cfg = AppConfig::paper_defaults();
    cfg.engine.tick_interval_ms = 1;
    cfg.engine.run_dir = std::env::temp_dir()
        .join(format!("crossarb-it-{tag}-{}", std::process::id()))
        .to_string_lossy()
        .to_string();
    let _ = std::fs::remove_dir_all(&cfg.engine.run_dir);
    cfg.watcher.poll_interval_secs = 1;
    cfg.watcher.zero_win_min_trades = 1_000_000;
    cfg.watcher.max_consecutive_losses = 1_000_000;
    cfg.watcher.winrate_min_trades = 1_000_000;
    cfg.watcher.starvation_min_opportunities = 1_000_000;
    cfg.watcher.max_drawdown_pct = 1_000.0;
    // Quiet simulator: no stochastic rejects/partials, so ledger counts and
    // pair completion are exact
    cfg.simulator.partial_fill_prob = 0.0;
    cfg.simulator.adverse_slip_prob = 0.0;
    cfg.simulator.reject_prob = 0.0;
    cfg
}

/// Order book with known depth on both sides
pub fn sample_order_book(venue: &str, mid: Decimal) -> OrderBook {
    let tick = mid * dec!(0.0005);
    OrderBook {
        venue: venue.to_string(),
        symbol: "BTC".to_string(),
        bids: vec![
            PriceLevel::new(mid - tick, dec!(0.5)),
            PriceLevel::new(mid - tick * dec!(2), dec!(1.0)),
            PriceLevel::new(mid - tick * dec!(3), dec!(1.5)),
        ],
        asks: vec![
            PriceLevel::new(mid + tick, dec!(0.5)),
            PriceLevel::new(mid + tick * dec!(2), dec!(1.0)),
            PriceLevel::new(mid + tick * dec!(3), dec!(1.5)),
        ],
        timestamp: Utc::now(),
    }
}

/// Anchors for a mock feed quoting KRW
pub fn krw_anchors() -> HashMap<String, Decimal> {
    HashMap::from([
        ("BTC".to_string(), dec!(90_000_000)),
        ("ETH".to_string(), dec!(4_500_000)),
    ])
}

/// Anchors for a mock feed quoting USDT at 1350 KRW/USDT
pub fn usdt_anchors() -> HashMap<String, Decimal> {
    HashMap::from([
        ("BTC".to_string(), dec!(66_666.67)),
        ("ETH".to_string(), dec!(3_333.33)),
    ])
}

pub fn krw() -> Currency {
    Currency::Krw
}

pub fn usdt() -> Currency {
    Currency::Usdt
}
