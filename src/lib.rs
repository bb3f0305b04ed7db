//! A native Rust preconditioned Krylov sparse-linear-solver library.
//!
//! Provides:
//! - An accumulating sparse-matrix builder and a compressed-row (`CSR`) matrix type, generic
//!   over real (`f64`) or complex (`Complex<f64>`) scalars.
//! - Two incomplete-factorisation preconditioners: accelerated Incomplete Cholesky (symmetric
//!   positive-definite systems) and dual-threshold Incomplete LU with a fill-reducing symmetric
//!   reordering (general systems).
//! - Two three-term-recurrence Minimum-Residual (MRTR) Krylov drivers, one per preconditioner
//!   family, sharing a single convergence/divergence control policy.
//!
//! ## Example
//! ```rust
//! use sparse_mrtr::prelude::*;
//!
//! let mut builder: MatrixBuilder<f64> = MatrixBuilder::new(3);
//! builder.add(0, 0, 4.0);
//! builder.add(0, 1, 1.0);
//! builder.add(1, 0, 1.0);
//! builder.add(1, 1, 3.0);
//! builder.add(2, 2, 2.0);
//! let a = builder.build(false);
//!
//! let b = nalgebra::DVector::from_vec(vec![1.0, 2.0, 3.0]);
//! let x0 = nalgebra::DVector::from_element(3, 0.0);
//! let outcome = solve_sgs_mrtr(&a, &b, &x0, &SolveOptions::default()).unwrap();
//! assert!(outcome.converged);
//! ```

pub mod builder;
pub mod csr;
pub mod error;
pub mod ordering;
pub mod precond;
pub mod scalar;
pub mod solver;
pub mod triangular;

pub mod prelude {
    pub use crate::builder::{read_matrix_file, MatrixBuilder};
    pub use crate::csr::SparseMatrix;
    pub use crate::error::{SolverError, SolverResult};
    pub use crate::precond::ic::{self, IcFactor};
    pub use crate::precond::ilut::{self, IlutFactor};
    pub use crate::scalar::Scalar;
    pub use crate::solver::{
        solve_ic_mrtr, solve_sgs_mrtr, DivergeJudgeType, NormalizeType, SolveOptions, SolveOutcome,
        SolveSummary,
    };
}
