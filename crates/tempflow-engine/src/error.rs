//! Engine error types.

use tempflow_core::FlowError;

/// Errors that can occur while computing a flow.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The linear program could not be built or solved to optimality.
    #[error("solver failure: {reason}")]
    SolverFailure { reason: String },

    /// Graph, DAG or configuration error from tempflow-core.
    #[error(transparent)]
    Core(#[from] FlowError),

    /// Filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
