//! Residual normalisation, best-iterate shadowing, and divergence detection shared by both
//! MRTR drivers (spec §4.6).

use nalgebra::DVector;

use crate::scalar::Scalar;
use crate::solver::options::{DivergeJudgeType, NormalizeType, SolveOptions};

/// Per-solve mutable state threaded through the iteration loop. Owned by the driver, not the
/// caller — there is no process-wide or solver-instance equivalent.
pub(crate) struct ConvergenceState<T: Scalar> {
    normalizer: f64,
    abs_conv_cri: f64,
    best_norm_r: f64,
    best_x: Option<DVector<T>>,
    bad_count: usize,
    pub residual_log: Vec<f64>,
}

/// Outcome of a single convergence check.
pub(crate) enum CheckOutcome {
    Continue,
    Converged,
    Diverged,
}

impl<T: Scalar> ConvergenceState<T> {
    pub fn new(rhs_norm: f64, initial_precond_residual_norm: f64, opts: &SolveOptions) -> Self {
        let normalizer = match opts.conv_normalize_type {
            NormalizeType::RhsNorm => rhs_norm,
            NormalizeType::InitialResidualNorm => initial_precond_residual_norm,
            NormalizeType::UserConstant => opts.conv_normalize_const,
        };
        let abs_conv_cri = f64::max(opts.small_abs_conv_val, rhs_norm * opts.conv_cri * 0.9);
        Self {
            normalizer,
            abs_conv_cri,
            best_norm_r: f64::INFINITY,
            best_x: None,
            bad_count: 0,
            residual_log: Vec::new(),
        }
    }

    /// Records this iteration's residual, updates the best-iterate shadow and divergence
    /// counter, and reports whether the driver should stop.
    pub fn observe(&mut self, norm_r: f64, x: &DVector<T>, opts: &SolveOptions) -> CheckOutcome {
        let normalized = if self.normalizer != 0.0 {
            norm_r / self.normalizer
        } else {
            norm_r
        };

        if opts.is_save_residual_log {
            self.residual_log.push(normalized);
        }

        if normalized < self.best_norm_r {
            self.best_norm_r = normalized;
            if opts.is_save_best {
                self.best_x = Some(x.clone());
            }
        }

        if matches!(opts.diverge_judge_type, DivergeJudgeType::ConsecutiveBadRatio) {
            if normalized >= self.best_norm_r * opts.bad_div_val {
                self.bad_count += 1;
            } else {
                self.bad_count = 0;
            }
        }

        if normalized < opts.conv_cri || norm_r < self.abs_conv_cri {
            return CheckOutcome::Converged;
        }
        if matches!(opts.diverge_judge_type, DivergeJudgeType::ConsecutiveBadRatio)
            && self.bad_count >= opts.bad_div_count_thres
        {
            return CheckOutcome::Diverged;
        }
        CheckOutcome::Continue
    }

    /// The best-tracked iterate, if `is_save_best` was enabled and at least one iteration ran;
    /// otherwise `fallback` (the driver's final iterate).
    pub fn best_or(self, fallback: DVector<T>) -> DVector<T> {
        self.best_x.unwrap_or(fallback)
    }
}
