//! Fill-reducing symmetric reordering for ILU-T.
//!
//! `fea_solver::math::sparse::reverse_cuthill_mckee` already walks an adjacency list built from
//! a CSR's structural pattern and produces a permutation by a greedy traversal keyed on vertex
//! degree. This module keeps that adjacency-list shape but replaces the breadth-first traversal
//! with a greedy minimum-degree elimination (spec calls for "an Approximate-Minimum-Degree
//! ordering"): repeatedly pick the lowest-degree remaining vertex, eliminate it, and fold its
//! neighbours into a clique (the standard minimum-degree update), which is what actually reduces
//! fill-in for an LU-type factorisation — a pure RCM relabelling does not by itself minimise
//! fill, it only shrinks bandwidth, so it does not satisfy the ILU-T requirement on its own.
//!
//! No `amd`-family crate appears anywhere in the retrieved example pack, so this is a from-
//! scratch greedy approximation rather than a call into a dedicated fill-reduction crate.

use std::collections::BTreeSet;

use crate::scalar::Scalar;
use crate::csr::SparseMatrix;

/// Returns a permutation `perm` such that `perm[new_index] = old_index`, approximately
/// minimising fill-in for a symmetric elimination of the pattern `A + Aᵀ`.
pub fn amd_like_order<T: Scalar>(a: &SparseMatrix<T>) -> Vec<usize> {
    let n = a.nrows();
    let mut adj: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for i in 0..n {
        let (cols, _) = a.row(i);
        for &j in cols {
            if i != j {
                adj[i].insert(j);
                adj[j].insert(i);
            }
        }
    }

    let mut eliminated = vec![false; n];
    let mut perm = Vec::with_capacity(n);

    for _ in 0..n {
        // Pick the remaining vertex with the smallest degree (ties broken by index, for a
        // deterministic ordering).
        let next = (0..n)
            .filter(|&v| !eliminated[v])
            .min_by_key(|&v| adj[v].len())
            .expect("at least one vertex remains");

        perm.push(next);
        eliminated[next] = true;

        // Fold the eliminated vertex's neighbourhood into a clique (minimum-degree update):
        // every pair of still-live neighbours of `next` becomes adjacent, approximating the
        // fill this elimination step would introduce.
        let neighbours: Vec<usize> = adj[next]
            .iter()
            .copied()
            .filter(|&v| !eliminated[v])
            .collect();
        for &u in &neighbours {
            adj[u].remove(&next);
            for &v in &neighbours {
                if u != v {
                    adj[u].insert(v);
                }
            }
        }
    }

    perm
}

/// Inverts a permutation: `inv[perm[i]] = i`.
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0usize; perm.len()];
    for (new_idx, &old_idx) in perm.iter().enumerate() {
        inv[old_idx] = new_idx;
    }
    inv
}

/// Applies a symmetric permutation to a matrix: returns `P A Pᵀ` where `P` maps old index
/// `perm[i]` to new index `i`.
pub fn permute_symmetric<T: Scalar>(a: &SparseMatrix<T>, perm: &[usize]) -> SparseMatrix<T> {
    let inv = invert_permutation(perm);
    let n = a.nrows();
    let mut builder = crate::builder::MatrixBuilder::new(n);
    for old_i in 0..n {
        let (cols, vals) = a.row(old_i);
        let new_i = inv[old_i];
        for (&old_j, &v) in cols.iter().zip(vals) {
            builder.add(new_i, inv[old_j], v);
        }
    }
    builder.build(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MatrixBuilder;

    #[test]
    fn permutation_is_a_bijection() {
        let mut b: MatrixBuilder<f64> = MatrixBuilder::new(5);
        for i in 0..5 {
            b.add(i, i, 1.0);
        }
        b.add(0, 1, 0.5);
        b.add(1, 0, 0.5);
        b.add(1, 2, 0.5);
        b.add(2, 1, 0.5);
        let a = b.build(false);
        let perm = amd_like_order(&a);
        let mut seen = vec![false; 5];
        for &p in &perm {
            assert!(!seen[p]);
            seen[p] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn invert_round_trips() {
        let perm = vec![2, 0, 1];
        let inv = invert_permutation(&perm);
        for (i, &p) in perm.iter().enumerate() {
            assert_eq!(inv[p], i);
        }
    }
}
