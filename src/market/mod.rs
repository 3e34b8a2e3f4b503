//! Market-facing seams: data providers, FX, and outbound rate limiting

pub mod fx;
pub mod provider;
pub mod rate_limit;

pub use fx::{validate_fx_provider, FixedFxProvider, FxProvider, FxQuote};
pub use provider::{MarketDataProvider, MockMarketProvider};
pub use rate_limit::VenueRateLimiter;
