//! Per-call solver configuration.
//!
//! Mirrors `fea_solver::analysis::AnalysisOptions`: an immutable, `Default`-able, builder-style
//! record passed into each solve call rather than stored as solver-instance state. There is no
//! `MrtrSolver` object to configure — `solve_sgs_mrtr`/`solve_ic_mrtr` are pure functions of
//! `(A, b, x0, opts)`.

use serde::{Deserialize, Serialize};

/// How the per-iteration residual is normalised before being compared against `conv_cri`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeType {
    /// `normR = norm_r / ‖b‖`.
    RhsNorm,
    /// `normR = norm_r / (initial preconditioned residual norm)`.
    InitialResidualNorm,
    /// `normR = norm_r / conv_normalize_const`.
    UserConstant,
}

impl Default for NormalizeType {
    fn default() -> Self {
        Self::RhsNorm
    }
}

/// Divergence-detection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergeJudgeType {
    /// Only `max_ite` terminates a non-converging iteration.
    IterationCapOnly,
    /// Abort once `normR >= best * bad_div_val` has held for `bad_div_count_thres` iterations
    /// in a row.
    ConsecutiveBadRatio,
}

impl Default for DivergeJudgeType {
    fn default() -> Self {
        Self::IterationCapOnly
    }
}

/// Immutable configuration for one `solve_sgs_mrtr`/`solve_ic_mrtr` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Relative convergence criterion compared against the normalised residual.
    pub conv_cri: f64,
    /// Iteration cap.
    pub max_ite: usize,
    /// Whether to diagonal-scale `A`/`b` before iterating (SGS-MRTR only; IC-MRTR factorises
    /// the matrix it is given and does not rescale it mid-solve).
    pub is_diag_scale: bool,
    /// Track a shadow copy of `x` at the iteration with the smallest observed `normR`, and
    /// return it in place of the final iterate on non-convergence.
    pub is_save_best: bool,
    /// Append each iteration's `normR` to `SolveOutcome::residual_log`.
    pub is_save_residual_log: bool,
    pub diverge_judge_type: DivergeJudgeType,
    /// Ratio against the best-observed `normR` past which an iteration counts as "bad".
    pub bad_div_val: f64,
    /// Consecutive bad iterations before aborting as diverged.
    pub bad_div_count_thres: usize,
    pub conv_normalize_type: NormalizeType,
    /// Used only when `conv_normalize_type == UserConstant`.
    pub conv_normalize_const: f64,
    /// Floor for the absolute convergence criterion: `abs_conv_cri = max(small_abs_conv_val,
    /// ‖b‖ · conv_cri · 0.9)`.
    pub small_abs_conv_val: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            conv_cri: 1e-8,
            max_ite: 1000,
            is_diag_scale: true,
            is_save_best: true,
            is_save_residual_log: false,
            diverge_judge_type: DivergeJudgeType::IterationCapOnly,
            bad_div_val: 1e3,
            bad_div_count_thres: 50,
            conv_normalize_type: NormalizeType::RhsNorm,
            conv_normalize_const: 1.0,
            small_abs_conv_val: 1e-12,
        }
    }
}

impl SolveOptions {
    pub fn with_conv_cri(mut self, conv_cri: f64) -> Self {
        self.conv_cri = conv_cri;
        self
    }

    pub fn with_max_iter(mut self, max_ite: usize) -> Self {
        self.max_ite = max_ite;
        self
    }

    pub fn with_diag_scale(mut self, enabled: bool) -> Self {
        self.is_diag_scale = enabled;
        self
    }

    pub fn with_save_best(mut self, enabled: bool) -> Self {
        self.is_save_best = enabled;
        self
    }

    pub fn with_residual_log(mut self, enabled: bool) -> Self {
        self.is_save_residual_log = enabled;
        self
    }

    pub fn with_divergence_detection(mut self, bad_div_val: f64, count_thres: usize) -> Self {
        self.diverge_judge_type = DivergeJudgeType::ConsecutiveBadRatio;
        self.bad_div_val = bad_div_val;
        self.bad_div_count_thres = count_thres;
        self
    }

    pub fn with_normalize(mut self, ty: NormalizeType, user_const: f64) -> Self {
        self.conv_normalize_type = ty;
        self.conv_normalize_const = user_const;
        self
    }
}
