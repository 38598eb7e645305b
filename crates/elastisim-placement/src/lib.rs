//! elastisim-placement — which unit to reclaim, where a job should go.
//!
//! Nothing in this crate mutates fleet state. Callers hand in snapshots
//! (utilization, history, assigned job counts) and get back ordered ids;
//! the scheduler applies the result.
//!
//! # Components
//!
//! - **`consolidation`** — Pearson correlation against the host history,
//!   picks the unit whose load tracks the host most closely
//! - **`scorer`** — Least-utilized reclaim ordering and least-loaded
//!   migration destination

pub mod consolidation;
pub mod scorer;

pub use consolidation::{Candidate, RankedCandidate, pearson, rank, select};
pub use scorer::{DestinationLoad, ReclaimCandidate, least_loaded, rank_reclaim_candidates};
