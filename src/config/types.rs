//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How the engine is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Simulated fills, mock or live data
    Paper,
    /// Live data; hard startup checks apply (e.g. fixed FX providers rejected)
    Live,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine loop settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Entry venue (the one we expect to buy on when it trades cheap)
    pub venue_a: VenueConfig,
    /// Exit venue
    pub venue_b: VenueConfig,
    /// Break-even model parameters
    #[serde(default)]
    pub break_even: BreakEvenConfig,
    /// Execution-quality cost model
    #[serde(default)]
    pub exec_cost: ExecCostConfig,
    /// Maker fill-probability model
    #[serde(default)]
    pub maker: MakerConfig,
    /// Order-book-imbalance filter
    #[serde(default)]
    pub obi: ObiConfig,
    /// Dynamic edge-threshold calibration
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Fill simulator behavior
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Safety governor thresholds
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// FX provider settings
    #[serde(default)]
    pub fx: FxConfig,
}

impl AppConfig {
    /// Ready-to-run paper configuration: Upbit KRW books against Binance USDT
    /// books through the fixed FX provider. Used when no config file is given.
    pub fn paper_defaults() -> Self {
        Self {
            engine: EngineConfig::default(),
            venue_a: VenueConfig {
                name: "upbit".to_string(),
                quote_currency: "KRW".to_string(),
                maker_fee_bps: dec!(2.5),
                taker_fee_bps: dec!(5),
                rate_limit_capacity: default_bucket_capacity(),
                rate_limit_refill_per_sec: default_bucket_refill(),
            },
            venue_b: VenueConfig {
                name: "binance".to_string(),
                quote_currency: "USDT".to_string(),
                maker_fee_bps: dec!(1),
                taker_fee_bps: dec!(10),
                rate_limit_capacity: default_bucket_capacity(),
                rate_limit_refill_per_sec: default_bucket_refill(),
            },
            break_even: BreakEvenConfig::default(),
            exec_cost: ExecCostConfig::default(),
            maker: MakerConfig::default(),
            obi: ObiConfig::default(),
            calibration: CalibrationConfig::default(),
            simulator: SimulatorConfig::default(),
            watcher: WatcherConfig::default(),
            fx: FxConfig::default(),
        }
    }
}

/// Engine loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_run_mode")]
    pub run_mode: RunMode,
    /// Delay between ticks in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Stop after this many ticks (0 = run until stopped)
    #[serde(default)]
    pub max_ticks: u64,
    /// Symbols to scan each tick
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// Quote notional per entry order, in KRW
    #[serde(default = "default_quote_notional_krw")]
    pub quote_notional_krw: Decimal,
    /// Directory for evidence artifacts and control state
    #[serde(default = "default_run_dir")]
    pub run_dir: String,
    /// Seed for all simulated randomness
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Build intents for unprofitable candidates (negative-edge experiments)
    #[serde(default)]
    pub allow_unprofitable: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            run_mode: default_run_mode(),
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: 0,
            symbols: default_symbols(),
            quote_notional_krw: default_quote_notional_krw(),
            run_dir: default_run_dir(),
            seed: default_seed(),
            allow_unprofitable: false,
        }
    }
}

fn default_run_mode() -> RunMode {
    RunMode::Paper
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_symbols() -> Vec<String> {
    vec!["BTC".to_string(), "ETH".to_string()]
}

fn default_quote_notional_krw() -> Decimal {
    dec!(1_000_000)
}

fn default_run_dir() -> String {
    "runs/latest".to_string()
}

fn default_seed() -> u64 {
    42
}

/// Per-venue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Venue name, e.g. "upbit" or "binance"
    pub name: String,
    /// Currency the venue quotes prices in
    pub quote_currency: String,
    /// Maker fee in bps (negative = rebate)
    #[serde(default)]
    pub maker_fee_bps: Decimal,
    /// Taker fee in bps
    pub taker_fee_bps: Decimal,
    /// Token-bucket capacity for outbound data calls
    #[serde(default = "default_bucket_capacity")]
    pub rate_limit_capacity: u32,
    /// Tokens restored per second
    #[serde(default = "default_bucket_refill")]
    pub rate_limit_refill_per_sec: f64,
}

fn default_bucket_capacity() -> u32 {
    10
}

fn default_bucket_refill() -> f64 {
    5.0
}

/// Break-even model parameters, all bps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenConfig {
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: Decimal,
    #[serde(default = "default_latency_bps")]
    pub latency_bps: Decimal,
    #[serde(default = "default_buffer_bps")]
    pub buffer_bps: Decimal,
    /// Deterministic drift subtracted from every candidate's edge
    #[serde(default = "default_drift_bps")]
    pub deterministic_drift_bps: Decimal,
}

impl Default for BreakEvenConfig {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            latency_bps: default_latency_bps(),
            buffer_bps: default_buffer_bps(),
            deterministic_drift_bps: default_drift_bps(),
        }
    }
}

fn default_slippage_bps() -> Decimal {
    dec!(5)
}

fn default_latency_bps() -> Decimal {
    dec!(2)
}

fn default_buffer_bps() -> Decimal {
    dec!(3)
}

fn default_drift_bps() -> Decimal {
    dec!(1)
}

/// Execution-quality cost model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecCostConfig {
    /// Constant spread cost: both legs pay the taker spread
    #[serde(default = "default_spread_cost_bps")]
    pub spread_cost_bps: Decimal,
    /// Linear slippage coefficient against notional/avg-size
    #[serde(default = "default_slippage_alpha")]
    pub slippage_alpha: Decimal,
    /// Cap on modeled slippage cost
    #[serde(default = "default_slippage_cap_bps")]
    pub slippage_cap_bps: Decimal,
    /// Penalty assumed when no book-depth data is available
    #[serde(default = "default_no_depth_penalty_bps")]
    pub no_depth_penalty_bps: Decimal,
    /// Fixed penalty once notional/avg-size exceeds the safe ratio
    #[serde(default = "default_partial_fill_risk_bps")]
    pub partial_fill_risk_bps: Decimal,
    /// Largest notional/avg-size ratio considered safe
    #[serde(default = "default_safe_size_ratio")]
    pub safe_size_ratio: Decimal,
    /// Book levels used for depth averages
    #[serde(default = "default_book_levels")]
    pub book_levels: usize,
}

impl Default for ExecCostConfig {
    fn default() -> Self {
        Self {
            spread_cost_bps: default_spread_cost_bps(),
            slippage_alpha: default_slippage_alpha(),
            slippage_cap_bps: default_slippage_cap_bps(),
            no_depth_penalty_bps: default_no_depth_penalty_bps(),
            partial_fill_risk_bps: default_partial_fill_risk_bps(),
            safe_size_ratio: default_safe_size_ratio(),
            book_levels: default_book_levels(),
        }
    }
}

fn default_spread_cost_bps() -> Decimal {
    dec!(4)
}

fn default_slippage_alpha() -> Decimal {
    dec!(10)
}

fn default_slippage_cap_bps() -> Decimal {
    dec!(100)
}

fn default_no_depth_penalty_bps() -> Decimal {
    dec!(20)
}

fn default_partial_fill_risk_bps() -> Decimal {
    dec!(15)
}

fn default_safe_size_ratio() -> Decimal {
    dec!(0.5)
}

fn default_book_levels() -> usize {
    5
}

/// Maker fill-probability model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakerConfig {
    /// Evaluate the maker path alongside the taker path
    #[serde(default)]
    pub enabled: bool,
    /// Assumed queue position ahead of us, as a fraction of depth
    #[serde(default = "default_queue_position")]
    pub queue_position: Decimal,
    /// Expected wait before a maker fill, in seconds
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: Decimal,
    /// Price drift while waiting, bps per second
    #[serde(default = "default_slippage_per_second_bps")]
    pub slippage_per_second_bps: Decimal,
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_position: default_queue_position(),
            wait_seconds: default_wait_seconds(),
            slippage_per_second_bps: default_slippage_per_second_bps(),
        }
    }
}

fn default_queue_position() -> Decimal {
    dec!(0.3)
}

fn default_wait_seconds() -> Decimal {
    dec!(5)
}

fn default_slippage_per_second_bps() -> Decimal {
    dec!(0.5)
}

/// Order-book-imbalance filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Minimum imbalance magnitude in the trade direction
    #[serde(default = "default_obi_threshold")]
    pub threshold: Decimal,
    /// Book levels included in the imbalance
    #[serde(default = "default_obi_levels")]
    pub levels: usize,
    /// Keep only the K best-ranked survivors per tick (0 = keep all)
    #[serde(default)]
    pub top_k: usize,
}

impl Default for ObiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_obi_threshold(),
            levels: default_obi_levels(),
            top_k: 0,
        }
    }
}

fn default_obi_threshold() -> Decimal {
    dec!(0.2)
}

fn default_obi_levels() -> usize {
    5
}

/// Dynamic edge-threshold calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Warm-up window before the threshold applies, seconds
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
    /// Requested percentile of observed net edges, 0..=1
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    /// Floor for the calibrated threshold, bps
    #[serde(default = "default_min_edge_bps")]
    pub min_edge_bps: Decimal,
    /// Minimum acceptable expected pass rate, 0..=1
    #[serde(default = "default_min_pass_rate")]
    pub min_pass_rate: f64,
    /// Minimum samples before the percentile is trusted
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            warmup_secs: default_warmup_secs(),
            percentile: default_percentile(),
            min_edge_bps: default_min_edge_bps(),
            min_pass_rate: default_min_pass_rate(),
            min_samples: default_min_samples(),
        }
    }
}

fn default_warmup_secs() -> u64 {
    60
}

fn default_percentile() -> f64 {
    0.75
}

fn default_min_edge_bps() -> Decimal {
    dec!(2)
}

fn default_min_pass_rate() -> f64 {
    0.05
}

fn default_min_samples() -> usize {
    20
}

/// Fill simulator behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Probability a fill comes back partial
    #[serde(default = "default_partial_fill_prob")]
    pub partial_fill_prob: f64,
    /// Smallest partial-fill ratio the simulator produces
    #[serde(default = "default_partial_fill_floor")]
    pub partial_fill_floor: f64,
    /// Probability of an adverse-slippage event
    #[serde(default = "default_adverse_slip_prob")]
    pub adverse_slip_prob: f64,
    /// Extra drift applied on an adverse event, bps
    #[serde(default = "default_adverse_extra_bps")]
    pub adverse_extra_bps: Decimal,
    /// Probability an order is rejected outright
    #[serde(default = "default_reject_prob")]
    pub reject_prob: f64,
    /// Simulated venue round-trip latency, milliseconds
    #[serde(default = "default_sim_latency_ms")]
    pub latency_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            partial_fill_prob: default_partial_fill_prob(),
            partial_fill_floor: default_partial_fill_floor(),
            adverse_slip_prob: default_adverse_slip_prob(),
            adverse_extra_bps: default_adverse_extra_bps(),
            reject_prob: default_reject_prob(),
            latency_ms: default_sim_latency_ms(),
        }
    }
}

fn default_partial_fill_prob() -> f64 {
    0.05
}

fn default_partial_fill_floor() -> f64 {
    0.4
}

fn default_adverse_slip_prob() -> f64 {
    0.03
}

fn default_adverse_extra_bps() -> Decimal {
    dec!(8)
}

fn default_reject_prob() -> f64 {
    0.01
}

fn default_sim_latency_ms() -> u64 {
    120
}

/// Safety governor thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Heartbeat interval, seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Guard A: closed trades required before zero wins is suspicious
    #[serde(default = "default_zero_win_min_trades")]
    pub zero_win_min_trades: u64,
    /// Guard B: seconds of sustained negative average PnL/trade
    #[serde(default = "default_negative_edge_window_secs")]
    pub negative_edge_window_secs: u64,
    /// Guard D: drawdown fraction of peak PnL that trips the run, 0..=1
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: f64,
    /// Guard E: loss streak length that trips the run
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u64,
    /// Guard F: winrate at or above this is statistically implausible, 0..=1
    #[serde(default = "default_winrate_cap")]
    pub winrate_cap: f64,
    /// Guard F: minimum closed trades before the winrate cap applies
    #[serde(default = "default_winrate_min_trades")]
    pub winrate_min_trades: u64,
    /// Starvation: opportunities seen with zero intents built
    #[serde(default = "default_starvation_min_opportunities")]
    pub starvation_min_opportunities: u64,
    /// Starvation: seconds the condition must hold
    #[serde(default = "default_starvation_window_secs")]
    pub starvation_window_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            zero_win_min_trades: default_zero_win_min_trades(),
            negative_edge_window_secs: default_negative_edge_window_secs(),
            max_drawdown_pct: default_max_drawdown_pct(),
            max_consecutive_losses: default_max_consecutive_losses(),
            winrate_cap: default_winrate_cap(),
            winrate_min_trades: default_winrate_min_trades(),
            starvation_min_opportunities: default_starvation_min_opportunities(),
            starvation_window_secs: default_starvation_window_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_zero_win_min_trades() -> u64 {
    15
}

fn default_negative_edge_window_secs() -> u64 {
    300
}

fn default_max_drawdown_pct() -> f64 {
    0.5
}

fn default_max_consecutive_losses() -> u64 {
    8
}

fn default_winrate_cap() -> f64 {
    0.95
}

fn default_winrate_min_trades() -> u64 {
    20
}

fn default_starvation_min_opportunities() -> u64 {
    50
}

fn default_starvation_window_secs() -> u64 {
    180
}

/// FX provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxConfig {
    /// Provider kind; only "fixed" ships with the engine
    #[serde(default = "default_fx_provider")]
    pub provider: String,
    /// KRW per USD(T) for the fixed provider
    #[serde(default = "default_fx_rate")]
    pub fixed_rate: Decimal,
    /// Maximum tolerated rate age before a hard reject, seconds
    #[serde(default = "default_fx_ttl_secs")]
    pub ttl_secs: i64,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            provider: default_fx_provider(),
            fixed_rate: default_fx_rate(),
            ttl_secs: default_fx_ttl_secs(),
        }
    }
}

fn default_fx_provider() -> String {
    "fixed".to_string()
}

fn default_fx_rate() -> Decimal {
    dec!(1350)
}

fn default_fx_ttl_secs() -> i64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = WatcherConfig::default();
        assert!(cfg.winrate_cap > 0.9);
        assert_eq!(cfg.winrate_min_trades, 20);

        let cal = CalibrationConfig::default();
        assert!(cal.percentile > 0.0 && cal.percentile < 1.0);
    }
}
