//! Triangular-solve primitives shared by both preconditioners.
//!
//! Each routine trusts its caller about triangularity (the type system has no "this CSR is lower
//! triangular" marker — the source doesn't either); they are `O(nnz(L))` and traverse each row
//! in its stored (ascending) column order, so floating-point results are reproducible modulo
//! reassociation of the same additions the reference performs.

use nalgebra::DVector;

use crate::csr::SparseMatrix;
use crate::scalar::{Scalar, Zero, One};

/// Solves `L v = r` for lower-triangular `L` (diagonal last in each row, at `row_start[i+1]-1`).
pub fn forward_solve<T: Scalar>(l: &SparseMatrix<T>, r: &DVector<T>) -> DVector<T> {
    let n = l.nrows();
    let mut v = DVector::from_element(n, T::zero());
    let row_start = l.row_start();
    let col_idx = l.col_idx();
    let vals = l.vals();
    for i in 0..n {
        let start = row_start[i];
        let diag_pos = row_start[i + 1] - 1;
        let mut acc = T::zero();
        for k in start..diag_pos {
            acc += vals[k] * v[col_idx[k]];
        }
        v[i] = (r[i] - acc) / vals[diag_pos];
    }
    v
}

/// Solves `Lᵀ v = r` for upper-triangular `Lᵀ` (diagonal first in each row, at `row_start[i]`).
pub fn backward_solve<T: Scalar>(lt: &SparseMatrix<T>, r: &DVector<T>) -> DVector<T> {
    let n = lt.nrows();
    let mut v = DVector::from_element(n, T::zero());
    let row_start = lt.row_start();
    let col_idx = lt.col_idx();
    let vals = lt.vals();
    for i in (0..n).rev() {
        let diag_pos = row_start[i];
        let end = row_start[i + 1];
        let mut acc = T::zero();
        for k in (diag_pos + 1)..end {
            acc += vals[k] * v[col_idx[k]];
        }
        v[i] = (r[i] - acc) / vals[diag_pos];
    }
    v
}

/// Applies `M⁻¹ r` for `M = L D⁻¹ Lᵀ`: forward-solve `L w = r`, then sweep `i` descending,
/// `v[i] = D[i] * (w[i] - Σ_{k > diag_pos(i) in Lᵀ} vals[k] * v[col[k]])`.
pub fn ic_apply<T: Scalar>(
    l: &SparseMatrix<T>,
    lt: &SparseMatrix<T>,
    d: &DVector<T>,
    r: &DVector<T>,
) -> DVector<T> {
    let n = l.nrows();
    let w = forward_solve(l, r);
    let mut v = DVector::from_element(n, T::zero());
    let row_start = lt.row_start();
    let col_idx = lt.col_idx();
    let vals = lt.vals();
    for i in (0..n).rev() {
        let diag_pos = row_start[i];
        let end = row_start[i + 1];
        let mut acc = T::zero();
        for k in (diag_pos + 1)..end {
            acc += vals[k] * v[col_idx[k]];
        }
        v[i] = d[i] * (w[i] - acc);
    }
    v
}
