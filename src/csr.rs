//! Immutable compressed-sparse-row matrix and its structural operators.
//!
//! Backed by `nalgebra_sparse::CsrMatrix`, which already stores column indices in ascending
//! order per row — precisely the invariant spec'd for `col_idx`. That ordering is what lets
//! `lower_triangle` put the diagonal last in a row (the largest kept column is always `i`) and
//! lets an upper-triangular row's diagonal land first (the smallest kept column is always `i`),
//! with no extra bookkeeping.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{SolverError, SolverResult};
use crate::scalar::{Scalar, Zero, One};

/// A finalised, read-only sparse matrix in compressed row form.
#[derive(Debug, Clone)]
pub struct SparseMatrix<T: Scalar> {
    csr: CsrMatrix<T>,
}

impl<T: Scalar> SparseMatrix<T> {
    pub(crate) fn from_csr(csr: CsrMatrix<T>) -> Self {
        Self { csr }
    }

    pub fn nrows(&self) -> usize {
        self.csr.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.csr.ncols()
    }

    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    /// Column indices and values of row `i`, in ascending-column order.
    pub fn row(&self, i: usize) -> (&[usize], &[T]) {
        let row = self.csr.row(i);
        (row.col_indices(), row.values())
    }

    pub fn row_start(&self) -> &[usize] {
        self.csr.row_offsets()
    }

    pub fn col_idx(&self) -> &[usize] {
        self.csr.col_indices()
    }

    pub fn vals(&self) -> &[T] {
        self.csr.values()
    }

    /// Looks up `A[i,i]`, if a diagonal entry is explicitly stored.
    pub fn diagonal_entry(&self, i: usize) -> Option<T> {
        let (cols, vals) = self.row(i);
        cols.binary_search(&i).ok().map(|k| vals[k])
    }

    fn require_square(&self) -> SolverResult<usize> {
        if self.nrows() != self.ncols() {
            return Err(SolverError::DimensionMismatch {
                expected: self.nrows(),
                actual: self.ncols(),
            });
        }
        Ok(self.nrows())
    }

    /// `y = A x`. `O(nnz)`.
    pub fn spmv(&self, x: &DVector<T>) -> SolverResult<DVector<T>> {
        if x.len() != self.ncols() {
            return Err(SolverError::DimensionMismatch {
                expected: self.ncols(),
                actual: x.len(),
            });
        }
        let n = self.nrows();
        let mut y = DVector::from_element(n, T::zero());
        let row_start = self.row_start();
        let col_idx = self.col_idx();
        let vals = self.vals();
        for i in 0..n {
            let (start, end) = (row_start[i], row_start[i + 1]);
            let mut acc = T::zero();
            for k in start..end {
                acc += vals[k] * x[col_idx[k]];
            }
            y[i] = acc;
        }
        Ok(y)
    }

    /// `y = A x`, SpMV with the per-row accumulation spread across a `rayon` thread pool.
    /// Gated behind the `parallel` feature; the summation order within a single row is
    /// unaffected (still the stored column order), only rows are distributed across workers.
    #[cfg(feature = "parallel")]
    pub fn spmv_parallel(&self, x: &DVector<T>) -> SolverResult<DVector<T>>
    where
        T: Send + Sync,
    {
        use rayon::prelude::*;

        if x.len() != self.ncols() {
            return Err(SolverError::DimensionMismatch {
                expected: self.ncols(),
                actual: x.len(),
            });
        }
        let n = self.nrows();
        let row_start = self.row_start();
        let col_idx = self.col_idx();
        let vals = self.vals();
        let mut out = vec![T::zero(); n];
        out.par_iter_mut().enumerate().for_each(|(i, y_i)| {
            let (start, end) = (row_start[i], row_start[i + 1]);
            let mut acc = T::zero();
            for k in start..end {
                acc += vals[k] * x[col_idx[k]];
            }
            *y_i = acc;
        });
        Ok(DVector::from_vec(out))
    }

    /// Structural transpose. `O(rows + nnz)`.
    pub fn transpose(&self) -> Self {
        Self::from_csr(self.csr.transpose())
    }

    /// Extracts `{(i,j,v) : j <= i}`. Diagonal (when stored) is the last entry of each row.
    pub fn lower_triangle(&self) -> Self {
        let n = self.nrows();
        let mut coo = CooMatrix::new(n, self.ncols());
        for i in 0..n {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                if j <= i {
                    coo.push(i, j, v);
                }
            }
        }
        Self::from_csr(CsrMatrix::from(&coo))
    }

    /// Extracts `{(i,j,v) : j >= i}`. Diagonal (when stored) is the first entry of each row.
    pub fn upper_triangle(&self) -> Self {
        let n = self.nrows();
        let mut coo = CooMatrix::new(n, self.ncols());
        for i in 0..n {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                if j >= i {
                    coo.push(i, j, v);
                }
            }
        }
        Self::from_csr(CsrMatrix::from(&coo))
    }

    /// Produces the diagonal scaling matrix `D` with `D[i,i] = 1/sqrt(|A[i,i]|)` and the scaled
    /// right-hand side `b' = D b`. Fails with `MissingDiagonal` if any row lacks a stored
    /// diagonal entry.
    pub fn diag_scaling(&self, b: &DVector<T>) -> SolverResult<(DVector<T>, DVector<T>)> {
        let n = self.require_square()?;
        let mut d = DVector::from_element(n, T::zero());
        for i in 0..n {
            let aii = self
                .diagonal_entry(i)
                .ok_or(SolverError::MissingDiagonal(i))?;
            d[i] = crate::scalar::inv_sqrt_modulus(aii);
        }
        let bp = DVector::from_iterator(n, (0..n).map(|i| d[i] * b[i]));
        Ok((d, bp))
    }

    /// Scales `self` on both sides by the diagonal `d`: returns `D A D` where `D = diag(d)`.
    pub fn scaled_by_diagonal(&self, d: &DVector<T>) -> Self {
        let n = self.nrows();
        let mut coo = CooMatrix::new(n, self.ncols());
        for i in 0..n {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                coo.push(i, j, d[i] * v * d[j]);
            }
        }
        Self::from_csr(CsrMatrix::from(&coo))
    }

    /// General sparse-sparse product `C = A B`, sorted columns in the result.
    pub fn multiply(&self, other: &Self) -> SolverResult<Self> {
        if self.ncols() != other.nrows() {
            return Err(SolverError::DimensionMismatch {
                expected: self.ncols(),
                actual: other.nrows(),
            });
        }
        Ok(Self::from_csr(&self.csr * &other.csr))
    }

    /// Whether every row `0..n` has a stored diagonal entry (`n = min(nrows, ncols)`).
    pub fn has_full_diagonal(&self) -> bool {
        let n = self.nrows().min(self.ncols());
        (0..n).all(|i| self.diagonal_entry(i).is_some())
    }

    pub(crate) fn inner(&self) -> &CsrMatrix<T> {
        &self.csr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MatrixBuilder;

    fn sample() -> SparseMatrix<f64> {
        let mut b = MatrixBuilder::new(3);
        b.add(0, 0, 4.0);
        b.add(0, 1, 1.0);
        b.add(1, 0, 1.0);
        b.add(1, 1, 3.0);
        b.add(1, 2, 1.0);
        b.add(2, 1, 1.0);
        b.add(2, 2, 2.0);
        b.build(false)
    }

    #[test]
    fn spmv_matches_dense_reference() {
        let a = sample();
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let y = a.spmv(&x).unwrap();
        assert!((y[0] - (4.0 * 1.0 + 1.0 * 2.0)).abs() < 1e-12);
        assert!((y[1] - (1.0 * 1.0 + 3.0 * 2.0 + 1.0 * 3.0)).abs() < 1e-12);
        assert!((y[2] - (1.0 * 2.0 + 2.0 * 3.0)).abs() < 1e-12);
    }

    #[test]
    fn lower_triangle_diagonal_is_last_entry() {
        let lower = sample().lower_triangle();
        for i in 0..lower.nrows() {
            let (cols, _) = lower.row(i);
            assert_eq!(*cols.last().unwrap(), i);
        }
    }

    #[test]
    fn upper_triangle_diagonal_is_first_entry() {
        let upper = sample().upper_triangle();
        for i in 0..upper.nrows() {
            let (cols, _) = upper.row(i);
            assert_eq!(cols[0], i);
        }
    }

    #[test]
    fn diag_scaling_requires_stored_diagonal() {
        let mut b = MatrixBuilder::new(2);
        b.add(0, 1, 5.0);
        b.add(1, 0, 5.0);
        let a = b.build(false);
        let rhs = DVector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(
            a.diag_scaling(&rhs),
            Err(SolverError::MissingDiagonal(_))
        ));
    }

    #[test]
    fn transpose_is_structural() {
        let a = sample();
        let at = a.transpose();
        assert_eq!(at.nrows(), a.ncols());
        assert_eq!(at.diagonal_entry(0), a.diagonal_entry(0));
    }
}
