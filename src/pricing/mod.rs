//! Price-domain math: fee/break-even model and quote normalization

pub mod fees;
pub mod normalize;

pub use fees::{
    compute_break_even_bps, compute_edge_bps, BreakEvenParams, FeePair, FeeStructure,
};
pub use normalize::{is_units_mismatch, normalize_price_to_krw, UNITS_MISMATCH_THRESHOLD_BPS};
