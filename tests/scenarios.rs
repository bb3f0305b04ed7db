//! End-to-end scenario tests (spec §8, S1-S6): each exercises the full builder → preconditioner
//! → Krylov driver pipeline against a concrete system with a known expected outcome.

use nalgebra::DVector;
use num_complex::Complex;
use sparse_mrtr::prelude::*;

fn trivial_3x3() -> SparseMatrix<f64> {
    let mut b: MatrixBuilder<f64> = MatrixBuilder::new(3);
    b.add(0, 0, 4.0);
    b.add(0, 1, 1.0);
    b.add(1, 0, 1.0);
    b.add(1, 1, 3.0);
    b.add(2, 2, 2.0);
    b.build(false)
}

// S1: trivial 3x3 SPD system, both drivers converge within 10 iterations at conv_cri = 1e-10.
#[test]
fn s1_trivial_spd_both_drivers_converge() {
    let a = trivial_3x3();
    let rhs = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    let x0 = DVector::from_element(3, 0.0);
    let opts = SolveOptions::default()
        .with_conv_cri(1e-10)
        .with_max_iter(10)
        .with_diag_scale(false);

    let expected = [1.0 / 11.0, 7.0 / 11.0, 1.5];

    let sgs = solve_sgs_mrtr(&a, &rhs, &x0, &opts).unwrap();
    assert!(sgs.converged);
    for i in 0..3 {
        assert!((sgs.x[i] - expected[i]).abs() < 1e-8, "sgs index {i}: {}", sgs.x[i]);
    }

    let ic = solve_ic_mrtr(&a, &rhs, 1.0, &x0, &opts).unwrap();
    assert!(ic.converged);
    for i in 0..3 {
        assert!((ic.x[i] - expected[i]).abs() < 1e-8, "ic index {i}: {}", ic.x[i]);
    }
}

// S2: identity matrix, x0 already solves the system -> zero iterations, immediate convergence.
#[test]
fn s2_identity_matrix_zero_iteration_early_return() {
    let mut builder: MatrixBuilder<f64> = MatrixBuilder::new(3);
    for i in 0..3 {
        builder.add(i, i, 1.0);
    }
    let a = builder.build(false);
    let rhs = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    let opts = SolveOptions::default().with_conv_cri(1e-10).with_diag_scale(false);

    let outcome = solve_sgs_mrtr(&a, &rhs, &rhs, &opts).unwrap();
    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 0);
    for i in 0..3 {
        assert!((outcome.x[i] - rhs[i]).abs() < 1e-12);
    }
}

// S3: diagonal scaling on vs off should both converge to the same solution on an SPD system
// whose diagonal entries vary widely in magnitude.
#[test]
fn s3_diagonal_scaling_matches_unscaled_solution() {
    let mut builder: MatrixBuilder<f64> = MatrixBuilder::new(3);
    builder.add(0, 0, 400.0);
    builder.add(0, 1, 10.0);
    builder.add(1, 0, 10.0);
    builder.add(1, 1, 3.0);
    builder.add(1, 2, 1.0);
    builder.add(2, 1, 1.0);
    builder.add(2, 2, 0.02);
    let a = builder.build(false);
    let rhs = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    let x0 = DVector::from_element(3, 0.0);

    let opts_scaled = SolveOptions::default().with_conv_cri(1e-10).with_max_iter(200).with_diag_scale(true);
    let opts_unscaled = SolveOptions::default().with_conv_cri(1e-10).with_max_iter(200).with_diag_scale(false);

    let scaled = solve_sgs_mrtr(&a, &rhs, &x0, &opts_scaled).unwrap();
    let unscaled = solve_sgs_mrtr(&a, &rhs, &x0, &opts_unscaled).unwrap();
    assert!(scaled.converged);
    assert!(unscaled.converged);
    for i in 0..3 {
        assert!((scaled.x[i] - unscaled.x[i]).abs() < 1e-6, "index {i}");
    }
}

// S4: IC auto-acceleration reports the alpha it actually converged at, clamped into range.
#[test]
fn s4_ic_auto_acceleration_reports_chosen_alpha() {
    // Near-singular 2x2: factorisation at alpha=1.0 breaks down, forcing at least one retry.
    let mut builder: MatrixBuilder<f64> = MatrixBuilder::new(2);
    builder.add(0, 0, 1.0);
    builder.add(0, 1, 0.999);
    builder.add(1, 0, 0.999);
    builder.add(1, 1, 1.0);
    let a = builder.build(false);
    let rhs = DVector::from_vec(vec![1.0, 1.0]);
    let x0 = DVector::from_element(2, 0.0);
    let opts = SolveOptions::default().with_conv_cri(1e-8).with_max_iter(100);

    let outcome = solve_ic_mrtr(&a, &rhs, 1.0, &x0, &opts).unwrap();
    let alpha_used = outcome.alpha_used.expect("IC-MRTR always reports its alpha");
    assert!((0.9..=10.0).contains(&alpha_used));
}

// S5: deliberately ill-conditioned non-SPD matrix with divergence detection enabled; the
// solver must abort before max_ite and return the best iterate rather than looping to the cap.
#[test]
fn s5_divergence_detection_aborts_before_iteration_cap() {
    let mut builder: MatrixBuilder<f64> = MatrixBuilder::new(3);
    // Strongly asymmetric, far from diagonally dominant: a poor fit for a Gauss-Seidel split.
    builder.add(0, 0, 1.0);
    builder.add(0, 1, 100.0);
    builder.add(1, 0, -100.0);
    builder.add(1, 1, 1.0);
    builder.add(1, 2, 100.0);
    builder.add(2, 1, -100.0);
    builder.add(2, 2, 1.0);
    let a = builder.build(false);
    let rhs = DVector::from_vec(vec![1.0, 1.0, 1.0]);
    let x0 = DVector::from_element(3, 0.0);

    let opts = SolveOptions::default()
        .with_conv_cri(1e-12)
        .with_max_iter(5000)
        .with_diag_scale(false)
        .with_divergence_detection(1e3, 50)
        .with_save_best(true);

    let outcome = solve_sgs_mrtr(&a, &rhs, &x0, &opts).unwrap();
    assert!(!outcome.converged);
    assert!(outcome.iterations < 5000, "expected early divergence abort, ran {}", outcome.iterations);
}

// S6: 4x4 complex diagonally-dominant system; IC-MRTR over Complex<f64> converges.
//
// The matrix is complex-*symmetric* (`A[i,j] == A[j,i]`, no conjugation), not Hermitian: §4.5's
// design notes require the unconjugated bilinear form throughout, and `precond::ic::factorize`
// sums `l_ik * l_jk` without conjugating either factor, so it only ever factorises a genuinely
// symmetric `A`. A Hermitian-but-not-symmetric input (`A[i,j] == conj(A[j,i])`) would silently
// factorise the wrong matrix under this scheme.
#[test]
fn s6_complex_symmetric_diagonally_dominant_system() {
    let mut builder: MatrixBuilder<Complex<f64>> = MatrixBuilder::new(4);
    let re = |v: f64| Complex::new(v, 0.0);
    for i in 0..4 {
        builder.add(i, i, re(4.0));
    }
    let off = Complex::new(0.5, 0.5);
    builder.add(0, 1, off);
    builder.add(1, 0, off);
    builder.add(1, 2, re(0.5));
    builder.add(2, 1, re(0.5));
    builder.add(2, 3, Complex::new(0.0, 0.5));
    builder.add(3, 2, Complex::new(0.0, 0.5));
    let a = builder.build(false);

    let rhs = DVector::from_vec(vec![re(1.0), re(2.0), re(3.0), re(4.0)]);
    let x0 = DVector::from_element(4, Complex::new(0.0, 0.0));
    let opts = SolveOptions::default().with_conv_cri(1e-10).with_max_iter(200);

    let outcome = solve_ic_mrtr(&a, &rhs, 1.0, &x0, &opts).unwrap();
    assert!(outcome.converged);
    let residual = a.spmv(&outcome.x).unwrap();
    for i in 0..4 {
        assert!((residual[i] - rhs[i]).norm() < 1e-6, "row {i}");
    }
}
