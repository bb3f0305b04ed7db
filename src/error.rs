//! Error types for the sparse Krylov solver library

use thiserror::Error;

/// Errors surfaced by matrix construction, factorisation, and solve operators.
///
/// Convergence failure is deliberately not a variant here: the Krylov drivers return it as
/// `SolveOutcome::converged == false` rather than as an `Err`, since failing to converge within
/// a budget is an expected outcome, not a programmer or data error.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("matrix is missing a stored diagonal entry at row {0}")]
    MissingDiagonal(usize),

    #[error("incomplete Cholesky produced a non-positive diagonal at row {0} (acceleration alpha = {1})")]
    NonPositiveDiagonal(usize, f64),

    #[error("row {0} of the matrix is entirely zero; ILU-T cannot factorise a zero row")]
    ZeroRow(usize),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error reading sparse matrix file: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
