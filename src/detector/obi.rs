//! Order-book-imbalance filter
//!
//! A positive score means bid-heavy books. Buying the cheap venue into a
//! bid-heavy book is the favorable configuration, so each direction gates on
//! the matching sign of the imbalance.

use rust_decimal::Decimal;

use crate::common::types::OrderBook;
use crate::detector::opportunity::{Direction, OpportunityCandidate};

/// Imbalance over the top `levels` of both sides, in [-1, 1]
///
/// Returns None when both sides are empty.
pub fn compute_obi_score(book: &OrderBook, levels: usize) -> Option<Decimal> {
    let bid_depth = book.bid_depth(levels);
    let ask_depth = book.ask_depth(levels);
    let total = bid_depth + ask_depth;
    if total <= Decimal::ZERO {
        return None;
    }
    Some((bid_depth - ask_depth) / total)
}

/// Directional OBI gate
#[derive(Debug, Clone)]
pub struct ObiFilter {
    pub threshold: Decimal,
    pub levels: usize,
}

impl ObiFilter {
    pub fn new(threshold: Decimal, levels: usize) -> Self {
        Self { threshold, levels }
    }

    /// Whether `score` supports trading in `direction`
    pub fn passes(&self, direction: Direction, score: Decimal) -> bool {
        match direction {
            Direction::BuyASellB => score >= self.threshold,
            Direction::BuyBSellA => score <= -self.threshold,
            Direction::None => false,
        }
    }

    /// Signed ranking key: larger is better for the candidate's direction
    pub fn rank_key(direction: Direction, score: Decimal) -> Decimal {
        match direction {
            Direction::BuyASellB => score,
            Direction::BuyBSellA => -score,
            Direction::None => Decimal::MIN,
        }
    }
}

/// Rank key for a candidate, for the per-tick top-K cut
///
/// Candidates without an OBI score rank last.
pub fn candidate_rank_key(candidate: &OpportunityCandidate) -> Decimal {
    candidate
        .obi_score
        .map(|s| ObiFilter::rank_key(candidate.direction, s))
        .unwrap_or(Decimal::MIN)
}
