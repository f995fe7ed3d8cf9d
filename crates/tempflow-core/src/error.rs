//! Core error types for tempflow-core.
//!
//! Uses `thiserror` for structured, matchable error variants. A DAG whose
//! sink is causally unreachable is not an error: it is reported as the
//! `ZeroFlow` outcome of preprocessing.

use thiserror::Error;

use crate::id::{AccountId, NodeId};

/// Errors produced by the tempflow-core crate.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The graph file is truncated or inconsistent.
    #[error("malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An account label outside the graph's node range was referenced.
    #[error("unknown account: {id}")]
    UnknownAccount { id: AccountId },

    /// An edge set cannot be turned into a source/sink DAG.
    #[error("invalid edge set: {reason}")]
    InvalidEdgeSet { reason: String },

    /// Path enumeration found no path between the two accounts.
    #[error("no path from {from} to {to}")]
    NoPath { from: AccountId, to: AccountId },

    /// The edge set is not acyclic; no flow can be computed.
    #[error("not a DAG: cycle through node {node}")]
    CycleDetected { node: NodeId },

    /// Path enumeration hit the edge-set capacity and dropped paths.
    #[error("edge-set capacity of {limit} edges exceeded, paths were dropped")]
    CapacityExceeded { limit: usize },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
