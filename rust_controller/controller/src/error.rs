use std::time::Duration;

use nlp::{SolverError, SolverStatus};
use prelude::*;

/// Reasons a control cycle produced no command. The caller is expected to
/// fall back to a safe actuation.
#[derive(Debug, thiserror::Error)]
pub enum MpcError {
    #[error("solver did not converge: {status}")]
    NonConvergent { status: SolverStatus },
    #[error("problem is infeasible, constraint violation {violation:.3e}")]
    Infeasible { violation: float },
    #[error("solver ran out of time after {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Solver(#[from] SolverError),
}
