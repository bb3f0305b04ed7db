//! Incremental, accumulating construction of a [`SparseMatrix`].
//!
//! Generalises `fea_solver::math::sparse::SparseMatrixBuilder` (itself a COO triplet list) to
//! match the source builder (`original_source/SparseSolv/SparseMatBuilderTMPL.hpp`): one ordered
//! `col -> value` map per row, values accumulated on repeated `add`, finalised row-major and
//! column-ascending on `build`.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Read};

use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::csr::SparseMatrix;
use crate::scalar::{Scalar, Zero, One};

/// Staged, mutable sparse-matrix construction: row index -> ordered `col -> value` map.
pub struct MatrixBuilder<T: Scalar> {
    size: usize,
    rows: Vec<BTreeMap<usize, T>>,
}

impl<T: Scalar> MatrixBuilder<T> {
    /// Creates a builder for `size` rows (column count is inferred from the entries added).
    pub fn new(size: usize) -> Self {
        Self {
            size,
            rows: (0..size).map(|_| BTreeMap::new()).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Accumulates `value` into `(row, col)`: `mapped[row][col] += value`.
    pub fn add(&mut self, row: usize, col: usize, value: T) {
        let entry = self.rows[row].entry(col).or_insert_with(T::zero);
        *entry += value;
    }

    /// Returns the position of `col` within row `row`'s ascending key order, if present.
    pub fn is_include(&self, row: usize, col: usize) -> Option<usize> {
        self.rows[row].keys().position(|&c| c == col)
    }

    /// The largest column index inserted so far.
    pub fn max_col(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.keys().next_back().copied())
            .max()
            .unwrap_or(0)
    }

    /// Finalises the builder into a read-only [`SparseMatrix`].
    ///
    /// The column count is `max(col)+1`, unless `to_square` is set and `rows > max(col)+1`, in
    /// which case a zero is inserted at `(rows-1, rows-1)` to pad the matrix out to square —
    /// exactly the source builder's `build(bool toSquare)` behaviour.
    pub fn build(self, to_square: bool) -> SparseMatrix<T> {
        let mut max_col = 0usize;
        let mut triplets: Vec<(usize, usize, T)> = Vec::new();
        for (row, cols) in self.rows.iter().enumerate() {
            for (&col, &val) in cols {
                triplets.push((row, col, val));
                if col > max_col {
                    max_col = col;
                }
            }
        }
        let mut ncols = max_col + 1;
        if to_square && self.size > ncols {
            triplets.push((self.size - 1, self.size - 1, T::zero()));
            ncols = self.size;
        }
        let mut coo = CooMatrix::new(self.size, ncols);
        for (row, col, val) in triplets {
            coo.push(row, col, val);
        }
        SparseMatrix::from_csr(CsrMatrix::from(&coo))
    }
}

/// Reads the interoperation matrix file format named in spec §6: a header line with the row
/// count `N`, then `N` per-row non-zero counts, then a `cols` section listing each row's column
/// indices, then a `vals` section listing the corresponding values in the same order.
///
/// This is the boundary for external collaborators (FE assembly code, scripting-host wrappers);
/// the format itself is unchanged from the source (`SparseMatBuilderTMPL::readMat`), modulo
/// replacing whitespace-delimited ad hoc tokens with a line-oriented reader.
pub fn read_matrix_file<T, R>(reader: R) -> io::Result<MatrixBuilder<T>>
where
    T: Scalar + std::str::FromStr,
    R: Read,
{
    let mut lines = io::BufReader::new(reader).lines();
    let header = next_nonblank(&mut lines)?;
    let n: usize = header
        .split_whitespace()
        .last()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing row count header"))?;

    let mut row_counts = Vec::with_capacity(n);
    for _ in 0..n {
        let line = next_nonblank(&mut lines)?;
        let count: usize = line
            .trim()
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad row count"))?;
        row_counts.push(count);
    }

    // "cols" section header
    next_nonblank(&mut lines)?;
    let mut row_cols: Vec<Vec<usize>> = Vec::with_capacity(n);
    for &count in &row_counts {
        let mut cols = Vec::with_capacity(count);
        if count == 0 {
            next_nonblank(&mut lines)?;
        } else {
            for _ in 0..count {
                let line = next_nonblank(&mut lines)?;
                let c: usize = line
                    .trim()
                    .parse()
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad column index"))?;
                cols.push(c);
            }
        }
        row_cols.push(cols);
    }

    // "vals" section header
    next_nonblank(&mut lines)?;
    let mut builder = MatrixBuilder::new(n);
    for (row, cols) in row_cols.iter().enumerate() {
        for &col in cols {
            let line = next_nonblank(&mut lines)?;
            let v: T = line
                .trim()
                .parse()
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad value"))?;
            builder.add(row, col, v);
        }
    }
    Ok(builder)
}

fn next_nonblank<B: BufRead>(lines: &mut io::Lines<B>) -> io::Result<String> {
    loop {
        let line = lines
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of file"))??;
        if !line.trim().is_empty() {
            return Ok(line);
        }
    }
}
