//! # Smoothing-parameter estimation by REML
//!
//! For a Gaussian response with identity link the penalized least-squares
//! problem has a closed form for every trial vector of log-smoothing
//! parameters `rho`. The outer loop therefore only has to minimise the
//! profiled REML criterion over `rho`:
//!
//! ```text
//! V(rho) = (n - Mp)/2 * (1 + ln(2*pi*phi)) + 1/2 ln|X'X + S| - 1/2 ln|S|+
//! phi    = (||y - X beta||^2 + beta' S beta) / (n - Mp)
//! ```
//!
//! where `S = sum_k exp(rho_k) S_k` and `Mp` is the dimension of the
//! unpenalized space. `V` and its analytic gradient are handed to the BFGS
//! optimizer from `wolfe_bfgs`.

use wolfe_bfgs::{Bfgs, BfgsError, BfgsSolution};

use crate::gam::basis::BasisError;
use crate::gam::construction::{DesignMatrices, PenaltyBlock};
use crate::gam::model::{FittedGam, RemlConfig};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use ndarray_linalg::error::LinalgError;
use ndarray_linalg::{Eigh, UPLO};
use std::cell::RefCell;
use std::collections::HashMap;
use std::f64::consts::PI;
use thiserror::Error;

/// Log-smoothing parameters are kept inside `[-RHO_BOUND, RHO_BOUND]`.
pub const RHO_BOUND: f64 = 15.0;

/// Eigenvalues of the penalized Hessian below this fraction of the largest one
/// mark the system as singular.
const HESSIAN_RELATIVE_TOLERANCE: f64 = 1e-13;

/// Cost reported to the optimizer for trial points that could not be evaluated.
const FAILED_EVALUATION_COST: f64 = 1e10;

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Underlying basis function generation failed: {0}")]
    BasisError(#[from] BasisError),

    #[error("A linear algebra routine failed: {0}")]
    LinalgError(#[from] LinalgError),

    #[error(
        "The penalized Hessian X'X + S is singular (smallest eigenvalue {min_eigenvalue:.3e}); the model is not identifiable."
    )]
    SingularPenalizedHessian { min_eigenvalue: f64 },

    #[error(
        "Only {rows} usable rows for a model with {unpenalized} unpenalized coefficients."
    )]
    InsufficientData { rows: usize, unpenalized: usize },

    #[error("Covariate '{0}' is constant over the modelled rows and cannot carry a smooth.")]
    DegenerateCovariate(String),

    #[error("REML/BFGS optimization failed: {0}")]
    RemlOptimizationFailed(String),

    #[error("An internal error occurred during model layout: {0}")]
    LayoutError(String),
}

/// Fits a Gaussian additive model, choosing smoothing parameters by REML.
///
/// A failure of the optimizer to converge is not fatal: it is logged, the
/// best point evaluated so far is used, and the fit is marked as not converged.
pub fn fit_gam(
    design: &DesignMatrices,
    y: ArrayView1<f64>,
    config: &RemlConfig,
) -> Result<FittedGam, EstimationError> {
    let n = y.len();
    if design.x.nrows() != n {
        return Err(EstimationError::LayoutError(format!(
            "design has {} rows but the response has {n}",
            design.x.nrows()
        )));
    }
    let unpenalized = design.null_space_dim();
    if n <= unpenalized {
        return Err(EstimationError::InsufficientData {
            rows: n,
            unpenalized,
        });
    }

    let state = internal::RemlState::new(y.view(), design.x.view(), &design.penalties, unpenalized);
    let num_penalties = design.penalties.len();

    let (final_rho, converged, iterations) = if num_penalties == 0 {
        (Array1::zeros(0), true, 0)
    } else {
        optimize_rho(&state, num_penalties, config)?
    };

    let fit = state.fit_for_rho(&final_rho)?;
    let reml_score = state.reml_score(&fit);
    let lambdas: Vec<f64> = final_rho.mapv(f64::exp).to_vec();

    // Effective degrees of freedom: diag(H^-1 X'X), summed per term.
    let influence = fit.h_inv.dot(&state.xtx);
    let edf_diag = influence.diag().to_owned();
    let total_edf = edf_diag.sum();
    let smooth_edf = design
        .layout
        .smooths
        .iter()
        .map(|term| edf_diag.slice(s![term.col_range.clone()]).sum())
        .collect();

    let fitted_values = design.x.dot(&fit.beta);
    let residuals = &y - &fitted_values;
    let log_likelihood = gaussian_log_likelihood(fit.rss, n);
    let aic = -2.0 * log_likelihood + 2.0 * (total_edf + 1.0);

    log::info!(
        "REML fit finished: edf = {total_edf:.3}, scale = {:.5}, AIC = {aic:.4}.",
        fit.scale
    );
    log::debug!("Estimated smoothing parameters: {lambdas:?}");

    Ok(FittedGam {
        layout: design.layout.clone(),
        coefficients: fit.beta.clone(),
        covariance: &fit.h_inv * fit.scale,
        lambdas,
        smooth_edf,
        total_edf,
        fitted_values,
        residuals,
        rss: fit.rss,
        scale: fit.scale,
        reml_score,
        log_likelihood,
        aic,
        n_obs: n,
        converged,
        iterations,
    })
}

/// Profile Gaussian log-likelihood at the maximum-likelihood variance `RSS / n`.
pub fn gaussian_log_likelihood(rss: f64, n: usize) -> f64 {
    let n = n as f64;
    let sigma2 = (rss / n).max(f64::MIN_POSITIVE);
    -0.5 * n * ((2.0 * PI * sigma2).ln() + 1.0)
}

/// Runs BFGS over `rho` and returns the chosen point, the convergence flag and the iteration count.
fn optimize_rho(
    state: &internal::RemlState,
    num_penalties: usize,
    config: &RemlConfig,
) -> Result<(Array1<f64>, bool, usize), EstimationError> {
    let initial_rho = Array1::<f64>::zeros(num_penalties);
    let (initial_cost, _) = state.cost_and_gradient(&initial_rho)?;
    if !initial_cost.is_finite() {
        return Err(EstimationError::RemlOptimizationFailed(format!(
            "initial REML score is not finite: {initial_cost}"
        )));
    }
    log::debug!("Initial REML score: {initial_cost:.6}");

    let best: RefCell<(Array1<f64>, f64)> = RefCell::new((initial_rho.clone(), initial_cost));

    let cost_and_grad = |rho_bfgs: &Array1<f64>| -> (f64, Array1<f64>) {
        let rho = rho_bfgs.mapv(|v| v.clamp(-RHO_BOUND, RHO_BOUND));
        match state.cost_and_gradient(&rho) {
            Ok((cost, mut grad)) if cost.is_finite() && grad.iter().all(|g| g.is_finite()) => {
                // Outside the box the criterion is flat in the clamped direction.
                for (g, &r) in grad.iter_mut().zip(rho_bfgs.iter()) {
                    if r.abs() > RHO_BOUND {
                        *g = 0.0;
                    }
                }
                let mut best = best.borrow_mut();
                if cost < best.1 {
                    *best = (rho, cost);
                }
                (cost, grad)
            }
            Ok((cost, _)) => {
                log::debug!("Non-finite REML score {cost} at rho = {rho}");
                (FAILED_EVALUATION_COST, Array1::zeros(rho.len()))
            }
            Err(e) => {
                log::debug!("REML evaluation failed at rho = {rho}: {e}");
                (FAILED_EVALUATION_COST, Array1::zeros(rho.len()))
            }
        }
    };

    let outcome = Bfgs::new(initial_rho, cost_and_grad)
        .with_tolerance(config.convergence_tolerance)
        .with_max_iterations(config.max_iterations)
        .run();

    match outcome {
        Ok(BfgsSolution {
            final_point,
            final_value,
            iterations,
            ..
        }) => {
            log::debug!("BFGS converged in {iterations} iterations, REML = {final_value:.6}");
            let (best_rho, best_cost) = best.into_inner();
            // The optimizer reports its last accepted point; keep whichever is lower.
            let rho = if best_cost < final_value {
                best_rho
            } else {
                final_point.mapv(|v| v.clamp(-RHO_BOUND, RHO_BOUND))
            };
            Ok((rho, true, iterations))
        }
        Err(e) => {
            let iterations = match &e {
                BfgsError::MaxIterationsReached { last_solution }
                | BfgsError::LineSearchFailed { last_solution, .. } => last_solution.iterations,
                BfgsError::GradientIsNaN | BfgsError::StepSizeTooSmall => 0,
            };
            let (best_rho, best_cost) = best.into_inner();
            log::warn!(
                "Smoothing-parameter search did not converge ({e}); using the best point found (REML = {best_cost:.6})."
            );
            Ok((best_rho, false, iterations))
        }
    }
}

mod internal {
    use super::*;

    /// Solution of the penalized least-squares problem at one `rho`.
    #[derive(Clone)]
    pub(super) struct PenalizedFit {
        pub(super) beta: Array1<f64>,
        pub(super) h_inv: Array2<f64>,
        pub(super) log_det_h: f64,
        pub(super) rss: f64,
        /// `beta' S_k beta` for each penalty, without the smoothing parameter.
        pub(super) penalty_quadratics: Vec<f64>,
        pub(super) lambdas: Vec<f64>,
        pub(super) scale: f64,
    }

    /// Holds the data and cached fits for the outer REML optimization.
    pub(super) struct RemlState<'a> {
        y: ArrayView1<'a, f64>,
        x: ArrayView2<'a, f64>,
        pub(super) xtx: Array2<f64>,
        xty: Array1<f64>,
        penalties: &'a [PenaltyBlock],
        unpenalized: usize,
        cache: RefCell<HashMap<Vec<u64>, PenalizedFit>>,
    }

    impl<'a> RemlState<'a> {
        pub(super) fn new(
            y: ArrayView1<'a, f64>,
            x: ArrayView2<'a, f64>,
            penalties: &'a [PenaltyBlock],
            unpenalized: usize,
        ) -> Self {
            Self {
                y,
                x,
                xtx: x.t().dot(&x),
                xty: x.t().dot(&y),
                penalties,
                unpenalized,
                cache: RefCell::new(HashMap::new()),
            }
        }

        fn residual_dof(&self) -> f64 {
            (self.y.len() - self.unpenalized) as f64
        }

        /// Solves `(X'X + S_lambda) beta = X'y`, caching the result by the bit pattern of `rho`.
        pub(super) fn fit_for_rho(&self, rho: &Array1<f64>) -> Result<PenalizedFit, EstimationError> {
            let key: Vec<u64> = rho.iter().map(|&v| v.to_bits()).collect();
            if let Some(cached) = self.cache.borrow().get(&key) {
                return Ok(cached.clone());
            }

            let lambdas: Vec<f64> = rho.iter().map(|r| r.exp()).collect();
            let mut h = self.xtx.clone();
            for (penalty, &lambda) in self.penalties.iter().zip(&lambdas) {
                let range = penalty.col_range.clone();
                let mut block = h.slice_mut(s![range.clone(), range]);
                block.scaled_add(lambda, &penalty.matrix);
            }

            let (eigenvalues, eigenvectors) = h.eigh(UPLO::Lower)?;
            let max_ev = eigenvalues.iter().copied().fold(0.0_f64, f64::max);
            let min_ev = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
            if !(max_ev > 0.0) || min_ev <= max_ev * HESSIAN_RELATIVE_TOLERANCE {
                return Err(EstimationError::SingularPenalizedHessian {
                    min_eigenvalue: min_ev,
                });
            }
            let log_det_h = eigenvalues.mapv(f64::ln).sum();
            let scaled_vectors = &eigenvectors / &eigenvalues.view().insert_axis(Axis(0));
            let h_inv = scaled_vectors.dot(&eigenvectors.t());

            let beta = h_inv.dot(&self.xty);
            let residuals = &self.y - &self.x.dot(&beta);
            let rss = residuals.dot(&residuals);

            let penalty_quadratics: Vec<f64> = self
                .penalties
                .iter()
                .map(|p| {
                    let b = beta.slice(s![p.col_range.clone()]);
                    b.dot(&p.matrix.dot(&b))
                })
                .collect();
            let penalized_deviance = rss
                + penalty_quadratics
                    .iter()
                    .zip(&lambdas)
                    .map(|(q, l)| q * l)
                    .sum::<f64>();
            // A floor relative to the response keeps ln(phi) finite for an exact fit.
            let floor = 1e-12 * (self.y.dot(&self.y) + 1.0);
            let scale = penalized_deviance.max(floor) / self.residual_dof();

            let fit = PenalizedFit {
                beta,
                h_inv,
                log_det_h,
                rss,
                penalty_quadratics,
                lambdas,
                scale,
            };
            self.cache.borrow_mut().insert(key, fit.clone());
            Ok(fit)
        }

        /// The REML criterion at an already computed fit.
        pub(super) fn reml_score(&self, fit: &PenalizedFit) -> f64 {
            let log_det_s: f64 = self
                .penalties
                .iter()
                .zip(&fit.lambdas)
                .map(|(p, l)| p.rank as f64 * l.ln() + p.log_pseudo_det)
                .sum();
            0.5 * self.residual_dof() * (1.0 + (2.0 * PI * fit.scale).ln()) + 0.5 * fit.log_det_h
                - 0.5 * log_det_s
        }

        /// REML criterion and its gradient with respect to `rho`.
        pub(super) fn cost_and_gradient(
            &self,
            rho: &Array1<f64>,
        ) -> Result<(f64, Array1<f64>), EstimationError> {
            let fit = self.fit_for_rho(rho)?;
            let cost = self.reml_score(&fit);

            let gradient = Array1::from_iter(self.penalties.iter().enumerate().map(|(k, p)| {
                let lambda = fit.lambdas[k];
                let range = p.col_range.clone();
                let h_inv_block = fit.h_inv.slice(s![range.clone(), range]);
                let trace = (&h_inv_block * &p.matrix).sum();
                lambda * fit.penalty_quadratics[k] / (2.0 * fit.scale) + 0.5 * lambda * trace
                    - 0.5 * p.rank as f64
            }));
            Ok((cost, gradient))
        }
    }
}
