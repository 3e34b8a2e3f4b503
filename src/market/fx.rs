//! FX-rate provider seam
//!
//! Cross-currency comparison is only as good as the FX rate behind it, and a
//! stale rate silently mis-prices every spread. Staleness past the TTL is
//! therefore a hard per-tick reject, never a fallback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::common::errors::{EngineError, Result};
use crate::common::types::Currency;

/// One FX observation with provenance
#[derive(Debug, Clone, PartialEq)]
pub struct FxQuote {
    /// Units of `to` per unit of `from`
    pub rate: Decimal,
    pub from: Currency,
    pub to: Currency,
    pub fetched_at: DateTime<Utc>,
    /// Provider name, recorded into the KPI for provenance
    pub provider: String,
}

impl FxQuote {
    /// Hard TTL check against `now`
    pub fn ensure_fresh(&self, ttl_secs: i64, now: DateTime<Utc>) -> Result<()> {
        let age = (now - self.fetched_at).num_seconds();
        if age > ttl_secs {
            return Err(EngineError::StaleFxRate {
                age_seconds: age,
                ttl_seconds: ttl_secs,
            });
        }
        Ok(())
    }
}

/// FX rate source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FxProvider: Send + Sync {
    /// Current conversion rate from `from` to `to`
    async fn get_fx_rate(&self, from: Currency, to: Currency) -> Result<FxQuote>;

    /// Whether this provider tracks a live market rate
    fn is_live(&self) -> bool;

    fn name(&self) -> &str;
}

/// Fixed-rate provider for paper runs
///
/// Returns the configured rate stamped at call time. `is_live()` is false, so
/// startup validation refuses to pair it with a live run mode.
pub struct FixedFxProvider {
    rate: Decimal,
}

impl FixedFxProvider {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl FxProvider for FixedFxProvider {
    async fn get_fx_rate(&self, from: Currency, to: Currency) -> Result<FxQuote> {
        if to != Currency::Krw {
            return Err(EngineError::FxUnavailable(format!(
                "fixed provider only quotes into KRW, requested {to}"
            )));
        }
        let rate = match from {
            Currency::Krw => Decimal::ONE,
            Currency::Usd | Currency::Usdt | Currency::Usdc => self.rate,
        };
        Ok(FxQuote {
            rate,
            from,
            to,
            fetched_at: Utc::now(),
            provider: "fixed".to_string(),
        })
    }

    fn is_live(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Startup check: a live run must never price spreads off a fixed rate
pub fn validate_fx_provider(
    run_mode: crate::config::types::RunMode,
    provider: &dyn FxProvider,
) -> Result<()> {
    if run_mode == crate::config::types::RunMode::Live && !provider.is_live() {
        return Err(EngineError::Configuration(format!(
            "FX provider '{}' is not live; refusing to start in live mode",
            provider.name()
        )));
    }
    Ok(())
}
