//! Opportunity sources
//!
//! One source is selected at startup and drives the whole gate pipeline for a
//! symbol each tick: fetch, normalize to KRW, detect, units guard, exec-cost
//! adjust, OBI and threshold filters. `Live` talks to real provider seams with
//! per-venue rate limiting; `Mock` replays a seeded synthetic market so runs
//! are reproducible offline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{Currency, OrderBook, RejectReason};
use crate::config::types::{AppConfig, MakerConfig};
use crate::detector::exec_cost::ExecCostModel;
use crate::detector::fill_prob::MakerFillModel;
use crate::detector::obi::{compute_obi_score, ObiFilter};
use crate::detector::opportunity::{Direction, OpportunityCandidate};
use crate::detector::threshold::{ThresholdCalibrator, ThresholdDecision};
use crate::market::fx::{FixedFxProvider, FxProvider, FxQuote};
use crate::market::provider::{MarketDataProvider, MockMarketProvider};
use crate::market::rate_limit::VenueRateLimiter;
use crate::pricing::fees::{BreakEvenParams, FeePair, FeeStructure};
use crate::pricing::normalize::{is_units_mismatch, normalize_price_to_krw};

/// A candidate that survived the gates, with the books it was priced against
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub candidate: OpportunityCandidate,
    pub book_a: Option<OrderBook>,
    pub book_b: Option<OrderBook>,
    pub fx: FxQuote,
}

impl Opportunity {
    /// Book on the venue the entry (buy) leg executes against
    pub fn buy_book(&self) -> Option<&OrderBook> {
        match self.candidate.direction {
            Direction::BuyASellB => self.book_a.as_ref(),
            Direction::BuyBSellA => self.book_b.as_ref(),
            Direction::None => None,
        }
    }

    /// Book on the venue the exit (sell) leg executes against
    pub fn sell_book(&self) -> Option<&OrderBook> {
        match self.candidate.direction {
            Direction::BuyASellB => self.book_b.as_ref(),
            Direction::BuyBSellA => self.book_a.as_ref(),
            Direction::None => None,
        }
    }
}

/// What one generate() call produced
#[derive(Debug)]
pub enum SourceEvent {
    Opportunity(Box<Opportunity>),
    Reject(RejectReason),
}

/// The shared gate pipeline both source strategies run
pub struct GatePipeline {
    params: BreakEvenParams,
    drift_bps: Decimal,
    exec_model: ExecCostModel,
    book_levels: usize,
    quote_notional_krw: Decimal,
    allow_unprofitable: bool,
    obi: Option<ObiFilter>,
    calibrator: Option<ThresholdCalibrator>,
    maker: Option<(MakerFillModel, MakerConfig)>,
}

impl GatePipeline {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let params = BreakEvenParams {
            fees: FeePair::new(
                FeeStructure::new(
                    cfg.venue_a.name.clone(),
                    cfg.venue_a.maker_fee_bps,
                    cfg.venue_a.taker_fee_bps,
                ),
                FeeStructure::new(
                    cfg.venue_b.name.clone(),
                    cfg.venue_b.maker_fee_bps,
                    cfg.venue_b.taker_fee_bps,
                ),
            ),
            slippage_bps: cfg.break_even.slippage_bps,
            latency_bps: cfg.break_even.latency_bps,
            buffer_bps: cfg.break_even.buffer_bps,
        };
        Self {
            params,
            drift_bps: cfg.break_even.deterministic_drift_bps,
            exec_model: ExecCostModel::new(cfg.exec_cost.clone()),
            book_levels: cfg.exec_cost.book_levels,
            quote_notional_krw: cfg.engine.quote_notional_krw,
            allow_unprofitable: cfg.engine.allow_unprofitable,
            obi: cfg.obi.enabled.then(|| ObiFilter::new(cfg.obi.threshold, cfg.obi.levels)),
            calibrator: cfg
                .calibration
                .enabled
                .then(|| ThresholdCalibrator::new(cfg.calibration.clone())),
            maker: cfg
                .maker
                .enabled
                .then(|| (MakerFillModel, cfg.maker.clone())),
        }
    }

    pub fn break_even_params(&self) -> &BreakEvenParams {
        &self.params
    }

    /// Latest calibration result, if the dynamic threshold is enabled
    pub fn calibration_state(&self) -> Option<crate::detector::threshold::CalibratedThreshold> {
        self.calibrator.as_ref().map(|c| c.calibrate())
    }

    /// Run every gate over one normalized price pair
    pub fn evaluate(
        &mut self,
        symbol: &str,
        exchange_a: &str,
        exchange_b: &str,
        price_a_krw: Decimal,
        price_b_krw: Decimal,
        book_a: Option<OrderBook>,
        book_b: Option<OrderBook>,
        fx: FxQuote,
        now: DateTime<Utc>,
    ) -> SourceEvent {
        let mut candidate = match OpportunityCandidate::evaluate(
            symbol,
            exchange_a,
            exchange_b,
            price_a_krw,
            price_b_krw,
            &self.params,
            self.drift_bps,
        ) {
            Some(c) => c,
            None => return SourceEvent::Reject(RejectReason::NonPositivePrice),
        };
        candidate.allow_unprofitable = self.allow_unprofitable;

        // Sanity guard before anything downstream sees the candidate
        if is_units_mismatch(candidate.spread_bps, candidate.edge_bps) {
            return SourceEvent::Reject(RejectReason::UnitsMismatch);
        }

        // Execution-cost adjustment; this is where profitability is re-decided
        let avg_size = avg_top_size(book_a.as_ref(), book_b.as_ref(), self.book_levels);
        if let Some(buy_price) = candidate.buy_price() {
            let order_qty = self.quote_notional_krw / buy_price;
            let breakdown = self
                .exec_model
                .estimate(candidate.edge_bps, order_qty, avg_size);
            candidate.apply_exec_cost(breakdown);
        }

        // OBI gate over venue A's book; direction signs mirror its imbalance
        if let Some(filter) = &self.obi {
            let score = book_a
                .as_ref()
                .or(book_b.as_ref())
                .and_then(|b| compute_obi_score(b, filter.levels));
            candidate.obi_score = score;
            if let Some(score) = score {
                if candidate.direction != Direction::None
                    && !filter.passes(candidate.direction, score)
                {
                    return SourceEvent::Reject(RejectReason::ObiThreshold);
                }
            }
        }

        // Dynamic edge threshold
        if let Some(calibrator) = &mut self.calibrator {
            if calibrator.check(candidate.net_edge_bps, now) == ThresholdDecision::Reject {
                return SourceEvent::Reject(RejectReason::BelowThreshold);
            }
        }

        // Maker-path estimate (informational, does not gate)
        if let Some((model, cfg)) = &self.maker {
            let depth = book_a
                .as_ref()
                .map(|b| b.bid_depth(self.book_levels))
                .unwrap_or(Decimal::ZERO);
            let order_qty = candidate
                .buy_price()
                .map(|p| self.quote_notional_krw / p)
                .unwrap_or(Decimal::ZERO);
            let volatility_bps = book_spread_bps(book_a.as_ref()).unwrap_or(Decimal::ZERO);
            let fill_probability =
                model.estimate_fill_probability(depth, order_qty, cfg.queue_position, volatility_bps);
            let opportunity_cost_bps = model.calculate_opportunity_cost_bps(
                fill_probability,
                cfg.wait_seconds,
                cfg.slippage_per_second_bps,
            );
            let net_edge_bps = model.estimate_maker_net_edge_bps(
                candidate.spread_bps,
                self.params.fees.entry.maker_fee_bps,
                self.params.slippage_bps,
                self.params.latency_bps,
                opportunity_cost_bps,
            );
            candidate.maker = Some(crate::detector::fill_prob::MakerEstimate {
                fill_probability,
                opportunity_cost_bps,
                net_edge_bps,
            });
        }

        SourceEvent::Opportunity(Box::new(Opportunity {
            candidate,
            book_a,
            book_b,
            fx,
        }))
    }
}

fn avg_top_size(
    book_a: Option<&OrderBook>,
    book_b: Option<&OrderBook>,
    levels: usize,
) -> Option<Decimal> {
    let sizes: Vec<Decimal> = [book_a, book_b]
        .into_iter()
        .flatten()
        .filter_map(|b| b.avg_top_size(levels))
        .collect();
    if sizes.is_empty() {
        return None;
    }
    let total: Decimal = sizes.iter().copied().sum();
    Some(total / Decimal::from(sizes.len() as u64))
}

fn book_spread_bps(book: Option<&OrderBook>) -> Option<Decimal> {
    let book = book?;
    let bid = book.best_bid()?.price;
    let ask = book.best_ask()?.price;
    let mid = (bid + ask) / Decimal::TWO;
    if mid <= Decimal::ZERO {
        return None;
    }
    Some((ask - bid) / mid * Decimal::from(10_000))
}

/// Opportunity source selected once at startup
pub enum OpportunitySource {
    Live(LiveOpportunitySource),
    Mock(MockOpportunitySource),
}

impl OpportunitySource {
    /// Produce at most one candidate for `symbol` this tick
    ///
    /// Recoverable data-quality failures surface as `SourceEvent::Reject`;
    /// only genuinely fatal conditions return an error.
    pub async fn generate(&mut self, symbol: &str) -> Result<SourceEvent> {
        match self {
            OpportunitySource::Live(src) => src.generate(symbol).await,
            OpportunitySource::Mock(src) => src.generate(symbol).await,
        }
    }

    pub fn pipeline(&self) -> &GatePipeline {
        match self {
            OpportunitySource::Live(src) => &src.pipeline,
            OpportunitySource::Mock(src) => &src.pipeline,
        }
    }
}

/// Live strategy: provider seams + per-venue token buckets
pub struct LiveOpportunitySource {
    provider_a: Arc<dyn MarketDataProvider>,
    provider_b: Arc<dyn MarketDataProvider>,
    fx: Arc<dyn FxProvider>,
    limiter_a: VenueRateLimiter,
    limiter_b: VenueRateLimiter,
    currency_a: Currency,
    currency_b: Currency,
    fx_ttl_secs: i64,
    book_depth: usize,
    pipeline: GatePipeline,
}

impl LiveOpportunitySource {
    pub fn new(
        cfg: &AppConfig,
        provider_a: Arc<dyn MarketDataProvider>,
        provider_b: Arc<dyn MarketDataProvider>,
        fx: Arc<dyn FxProvider>,
    ) -> Result<Self> {
        let currency_a: Currency = cfg.venue_a.quote_currency.parse()?;
        let currency_b: Currency = cfg.venue_b.quote_currency.parse()?;
        Ok(Self {
            provider_a,
            provider_b,
            fx,
            limiter_a: VenueRateLimiter::new(
                cfg.venue_a.name.clone(),
                cfg.venue_a.rate_limit_capacity,
                cfg.venue_a.rate_limit_refill_per_sec,
            ),
            limiter_b: VenueRateLimiter::new(
                cfg.venue_b.name.clone(),
                cfg.venue_b.rate_limit_capacity,
                cfg.venue_b.rate_limit_refill_per_sec,
            ),
            currency_a,
            currency_b,
            fx_ttl_secs: cfg.fx.ttl_secs,
            book_depth: cfg.exec_cost.book_levels,
            pipeline: GatePipeline::from_config(cfg),
        })
    }

    pub async fn generate(&mut self, symbol: &str) -> Result<SourceEvent> {
        if self.limiter_a.acquire().is_err() {
            return Ok(SourceEvent::Reject(RejectReason::RatelimitEntry));
        }
        if self.limiter_b.acquire().is_err() {
            return Ok(SourceEvent::Reject(RejectReason::RatelimitExit));
        }

        // Two short-lived parallel fetches, one per venue
        let (res_a, res_b) = tokio::join!(
            fetch_venue(self.provider_a.as_ref(), symbol, self.book_depth),
            fetch_venue(self.provider_b.as_ref(), symbol, self.book_depth),
        );
        let (ticker_a, book_a) = match res_a {
            Ok(pair) => pair,
            Err(e) if e.is_recoverable() => {
                return Ok(SourceEvent::Reject(RejectReason::PriceUnavailable))
            }
            Err(e) => return Err(e),
        };
        let (ticker_b, book_b) = match res_b {
            Ok(pair) => pair,
            Err(e) if e.is_recoverable() => {
                return Ok(SourceEvent::Reject(RejectReason::PriceUnavailable))
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let fx = match self.fx.get_fx_rate(self.currency_b, Currency::Krw).await {
            Ok(q) => q,
            Err(EngineError::FxUnavailable(_)) => {
                return Ok(SourceEvent::Reject(RejectReason::FxUnavailable))
            }
            Err(e) => return Err(e),
        };
        if fx.ensure_fresh(self.fx_ttl_secs, now).is_err() {
            return Ok(SourceEvent::Reject(RejectReason::FxStale));
        }

        let price_a_krw = normalize_price_to_krw(ticker_a.last, self.currency_a, Decimal::ONE)?;
        let price_b_krw = normalize_price_to_krw(ticker_b.last, self.currency_b, fx.rate)?;

        Ok(self.pipeline.evaluate(
            symbol,
            &ticker_a.venue,
            &ticker_b.venue,
            price_a_krw,
            price_b_krw,
            book_a,
            book_b,
            fx,
            now,
        ))
    }
}

async fn fetch_venue(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    depth: usize,
) -> Result<(crate::common::types::Ticker, Option<OrderBook>)> {
    let ticker = provider.get_ticker(symbol).await?;
    // A missing book is not fatal; the exec-cost model has a no-depth penalty
    let book = provider.get_orderbook(symbol, depth).await.ok();
    Ok((ticker, book))
}

/// Mock strategy: two seeded synthetic venues and a fixed FX rate
pub struct MockOpportunitySource {
    feed_a: MockMarketProvider,
    feed_b: MockMarketProvider,
    fx: FixedFxProvider,
    currency_a: Currency,
    currency_b: Currency,
    book_depth: usize,
    pipeline: GatePipeline,
    venue_a: String,
    venue_b: String,
}

impl MockOpportunitySource {
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        let currency_a: Currency = cfg.venue_a.quote_currency.parse()?;
        let currency_b: Currency = cfg.venue_b.quote_currency.parse()?;

        // Anchor both walks on the same KRW price so early spreads are small
        let mut anchors_a = HashMap::new();
        let mut anchors_b = HashMap::new();
        for (i, symbol) in cfg.engine.symbols.iter().enumerate() {
            let base_krw = Decimal::from(90_000_000u64 / (i as u64 + 1));
            anchors_a.insert(symbol.clone(), base_krw);
            anchors_b.insert(symbol.clone(), base_krw / cfg.fx.fixed_rate);
        }

        Ok(Self {
            feed_a: MockMarketProvider::new(
                cfg.venue_a.name.clone(),
                currency_a,
                anchors_a,
                cfg.engine.seed,
            ),
            feed_b: MockMarketProvider::new(
                cfg.venue_b.name.clone(),
                currency_b,
                anchors_b,
                cfg.engine.seed.wrapping_add(1),
            ),
            fx: FixedFxProvider::new(cfg.fx.fixed_rate),
            currency_a,
            currency_b,
            book_depth: cfg.exec_cost.book_levels,
            pipeline: GatePipeline::from_config(cfg),
            venue_a: cfg.venue_a.name.clone(),
            venue_b: cfg.venue_b.name.clone(),
        })
    }

    pub async fn generate(&mut self, symbol: &str) -> Result<SourceEvent> {
        let ticker_a = match self.feed_a.get_ticker(symbol).await {
            Ok(t) => t,
            Err(e) if e.is_recoverable() => {
                return Ok(SourceEvent::Reject(RejectReason::PriceUnavailable))
            }
            Err(e) => return Err(e),
        };
        let ticker_b = match self.feed_b.get_ticker(symbol).await {
            Ok(t) => t,
            Err(e) if e.is_recoverable() => {
                return Ok(SourceEvent::Reject(RejectReason::PriceUnavailable))
            }
            Err(e) => return Err(e),
        };
        let book_a = self.feed_a.get_orderbook(symbol, self.book_depth).await.ok();
        let book_b = self.feed_b.get_orderbook(symbol, self.book_depth).await.ok();

        let now = Utc::now();
        let fx = self.fx.get_fx_rate(self.currency_b, Currency::Krw).await?;

        let price_a_krw = normalize_price_to_krw(ticker_a.last, self.currency_a, Decimal::ONE)?;
        let price_b_krw = normalize_price_to_krw(ticker_b.last, self.currency_b, fx.rate)?;

        Ok(self.pipeline.evaluate(
            symbol,
            &self.venue_a,
            &self.venue_b,
            price_a_krw,
            price_b_krw,
            book_a,
            book_b,
            fx,
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn mock_source() -> MockOpportunitySource {
        let cfg = AppConfig::paper_defaults();
        MockOpportunitySource::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn test_mock_source_generates_candidates() {
        let mut src = mock_source();
        let event = src.generate("BTC").await.unwrap();
        match event {
            SourceEvent::Opportunity(opp) => {
                assert_eq!(opp.candidate.symbol, "BTC");
                assert!(opp.candidate.spread_bps >= Decimal::ZERO);
                if opp.candidate.direction != Direction::None {
                    assert!(opp.candidate.exec_cost.is_some());
                }
                assert_eq!(opp.fx.provider, "fixed");
            }
            SourceEvent::Reject(reason) => panic!("unexpected reject: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_mock_source_is_deterministic() {
        let mut a = mock_source();
        let mut b = mock_source();
        for _ in 0..5 {
            let ea = a.generate("BTC").await.unwrap();
            let eb = b.generate("BTC").await.unwrap();
            match (ea, eb) {
                (SourceEvent::Opportunity(x), SourceEvent::Opportunity(y)) => {
                    assert_eq!(x.candidate.spread_bps, y.candidate.spread_bps);
                    assert_eq!(x.candidate.net_edge_bps, y.candidate.net_edge_bps);
                }
                (SourceEvent::Reject(x), SourceEvent::Reject(y)) => assert_eq!(x, y),
                _ => panic!("sources diverged"),
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_a_recoverable_reject() {
        let mut src = mock_source();
        match src.generate("DOGE").await.unwrap() {
            SourceEvent::Reject(RejectReason::PriceUnavailable) => {}
            other => panic!("expected price_unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_pipeline_units_mismatch_guard() {
        let cfg = AppConfig::paper_defaults();
        let mut pipeline = GatePipeline::from_config(&cfg);
        let fx = FxQuote {
            rate: dec!(1350),
            from: Currency::Usdt,
            to: Currency::Krw,
            fetched_at: Utc::now(),
            provider: "fixed".to_string(),
        };
        // Un-normalized USDT price against a KRW price: enormous fake spread
        let event = pipeline.evaluate(
            "BTC",
            "upbit",
            "binance",
            dec!(99_000_000),
            dec!(70_000),
            None,
            None,
            fx,
            Utc::now(),
        );
        match event {
            SourceEvent::Reject(RejectReason::UnitsMismatch) => {}
            other => panic!("expected units_mismatch, got {other:?}"),
        }
    }
}
