//! Flow engines for temporal transaction DAGs.
//!
//! # Modules
//!
//! - [`greedy`] -- single-pass timestamp-ordered lower bound
//! - [`exact`] -- maximum causal flow as a linear program
//! - [`lp`] -- solver-neutral LP model and the default backend
//! - [`decompose`] -- chain collapsing before the exact solve
//! - [`pipeline`] -- every stage for one source/sink query

pub mod decompose;
pub mod error;
pub mod exact;
pub mod greedy;
pub mod lp;
pub mod pipeline;

pub use decompose::{decompose, decompose_with, Decomposition};
pub use error::EngineError;
pub use exact::{exact_flow, exact_flow_with};
pub use greedy::{chain_flow, greedy_flow, greedy_flow_ordered, FlowResult};
pub use lp::{LpBackend, LpModel, LpRow, LpSolution, MinilpBackend};
pub use pipeline::{
    analyze, AnalyzeOptions, FlowReport, PreprocessReport, SizeReport, StageOutcome,
};
