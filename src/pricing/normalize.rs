//! Quote-currency normalization into KRW
//!
//! Prices from the global venue are quoted in USDT (or USD/USDC) and must be
//! converted to KRW before being compared against the domestic venue. The
//! units-mismatch guard catches the classic failure where a conversion was
//! skipped and the "spread" is really a currency ratio.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::common::errors::Result;
use crate::common::types::Currency;

/// Spread or edge magnitudes above this are treated as a normalization bug,
/// not a tradeable opportunity. 100,000 bps = 1000%.
pub const UNITS_MISMATCH_THRESHOLD_BPS: Decimal = dec!(100_000);

/// Convert a price into KRW
///
/// Identity for KRW quotes; everything else is multiplied by the provided
/// KRW-per-unit FX rate. The currency itself has already been parsed, so the
/// unsupported-code failure happens upstream at parse time.
pub fn normalize_price_to_krw(
    price: Decimal,
    quote_currency: Currency,
    fx_rate: Decimal,
) -> Result<Decimal> {
    match quote_currency {
        Currency::Krw => Ok(price),
        Currency::Usd | Currency::Usdt | Currency::Usdc => Ok(price * fx_rate),
    }
}

/// Sanity guard against un-normalized quotes
///
/// True when either magnitude exceeds the threshold. Runs on every candidate
/// before it is accepted downstream.
pub fn is_units_mismatch(spread_bps: Decimal, edge_bps: Decimal) -> bool {
    spread_bps.abs() > UNITS_MISMATCH_THRESHOLD_BPS || edge_bps.abs() > UNITS_MISMATCH_THRESHOLD_BPS
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_krw_identity() {
        let result = normalize_price_to_krw(dec!(99_000_000), Currency::Krw, dec!(1350)).unwrap();
        assert_eq!(result, dec!(99_000_000));
    }

    #[test]
    fn test_usdt_conversion() {
        // 70,000 USDT * 1,350 KRW/USDT = 94,500,000 KRW
        let result = normalize_price_to_krw(dec!(70_000), Currency::Usdt, dec!(1350)).unwrap();
        assert_eq!(result, dec!(94_500_000));
    }

    #[test]
    fn test_unknown_code_rejected_at_parse() {
        assert!("GBP".parse::<Currency>().is_err());
    }

    #[test]
    fn test_units_mismatch_guard() {
        assert!(!is_units_mismatch(dec!(120), dec!(65)));
        // A BTC/KRW vs BTC/USDT comparison without FX produces a "spread" of
        // roughly 135,000% -- far beyond anything tradeable.
        assert!(is_units_mismatch(dec!(13_500_000), dec!(13_499_945)));
        assert!(is_units_mismatch(dec!(50), dec!(-200_000)));
    }

    #[test]
    fn test_units_mismatch_boundary() {
        assert!(!is_units_mismatch(dec!(100_000), dec!(0)));
        assert!(is_units_mismatch(dec!(100_001), dec!(0)));
    }
}
