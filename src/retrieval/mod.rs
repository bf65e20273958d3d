//! Confidence-gated two-stage retrieval.
//!
//! A query vector is normalized, shortlisted against class centroids ([`coarse`]), re-scored
//! against every sample of the shortlisted classes ([`fine`]), and checked by the escalation
//! [`gate`]. Ambiguous rankings go to the configured verifier, whose answer can only swap one
//! candidate to the front. [`ResultAssembler`] truncates, labels and timestamps the result.
//!
//! Without centroids the coarse stage is skipped and every bank class is ranked; the output
//! is then identical to a brute-force scan.

pub mod assemble;
pub mod coarse;
pub mod engine;
pub mod error;
pub mod fine;
pub mod gate;
pub mod types;


pub use assemble::{Draft, ResultAssembler};
pub use coarse::Shortlist;
pub use engine::RetrievalEngine;
pub use error::{RetrievalError, RetrievalResult};
pub use fine::FineRanking;
pub use gate::{GateDecision, GatePolicy, find_candidate, merge_verdict, swap_to_front};
pub use types::{
    EscalationReason, EscalationStatus, QueryMeta, RankedResult, RetrievalQuery,
    RetrievalSettings, ScoreItem, SearchMode,
};
