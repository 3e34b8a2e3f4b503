//! Opportunity detection and the gate pipeline
//!
//! A candidate is built from two KRW-normalized prices, then pushed through
//! the gates: units-mismatch sanity guard, execution-cost adjustment, OBI
//! direction filter, and the dynamic edge threshold. Profitability is decided
//! in exactly one place; see [`opportunity::OpportunityCandidate`].

pub mod exec_cost;
pub mod fill_prob;
pub mod obi;
pub mod opportunity;
pub mod source;
pub mod threshold;

pub use exec_cost::{ExecCostModel, ExecutionCostBreakdown};
pub use fill_prob::{MakerEstimate, MakerFillModel};
pub use obi::{candidate_rank_key, compute_obi_score, ObiFilter};
pub use opportunity::{Direction, OpportunityCandidate};
pub use source::{GatePipeline, Opportunity, OpportunitySource, SourceEvent};
pub use threshold::{CalibratedThreshold, ThresholdCalibrator};
