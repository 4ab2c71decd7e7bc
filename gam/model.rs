use crate::gam::basis::KnotStrategy;
use crate::gam::construction::ModelLayout;
use crate::gam::inference::{self, InferenceError};
use ndarray::{Array1, Array2, s};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- Public Data Structures ---
// These structs describe a fitted additive model and the human-readable
// summaries that end up in the TOML results file.

/// Configuration for a univariate P-spline basis expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasisConfig {
    pub num_knots: usize,
    pub degree: usize,
    pub penalty_order: usize,
    pub knot_strategy: KnotStrategy,
}

impl Default for BasisConfig {
    fn default() -> Self {
        Self {
            num_knots: 6,
            degree: 3,
            penalty_order: 2,
            knot_strategy: KnotStrategy::Uniform,
        }
    }
}

/// Settings for the outer REML/BFGS smoothing-parameter search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemlConfig {
    pub max_iterations: usize,
    pub convergence_tolerance: f64,
}

impl Default for RemlConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_tolerance: 1e-3,
        }
    }
}

/// A Gaussian additive model fitted by penalized least squares with REML
/// smoothing-parameter selection.
#[derive(Debug, Clone)]
pub struct FittedGam {
    pub layout: ModelLayout,
    /// Full coefficient vector, ordered as in `layout`.
    pub coefficients: Array1<f64>,
    /// Bayesian posterior covariance of the coefficients, `scale * H^-1`.
    pub covariance: Array2<f64>,
    /// Estimated smoothing parameters, one per penalty.
    pub lambdas: Vec<f64>,
    /// Effective degrees of freedom of each smooth term, in layout order.
    pub smooth_edf: Vec<f64>,
    pub total_edf: f64,
    pub fitted_values: Array1<f64>,
    pub residuals: Array1<f64>,
    pub rss: f64,
    /// REML estimate of the residual variance.
    pub scale: f64,
    pub reml_score: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub n_obs: usize,
    pub converged: bool,
    pub iterations: usize,
}

impl FittedGam {
    /// Residual degrees of freedom, `n - edf`.
    pub fn residual_df(&self) -> f64 {
        self.n_obs as f64 - self.total_edf
    }

    /// Proportion of the response variance explained by the fit.
    pub fn r_squared(&self) -> f64 {
        let y = &self.fitted_values + &self.residuals;
        let mean = y.mean().unwrap_or(0.0);
        let tss = y.mapv(|v| (v - mean).powi(2)).sum();
        if tss > 0.0 { 1.0 - self.rss / tss } else { f64::NAN }
    }

    /// Builds the coefficient table and smooth-term significance tests.
    pub fn summary(&self) -> Result<ModelSummary, InferenceError> {
        Ok(ModelSummary {
            n_obs: self.n_obs,
            total_edf: self.total_edf,
            residual_df: self.residual_df(),
            scale: self.scale,
            r_squared: self.r_squared(),
            reml_score: self.reml_score,
            log_likelihood: self.log_likelihood,
            aic: self.aic,
            converged: self.converged,
            iterations: self.iterations,
            parametric: inference::parametric_table(self),
            smooth_terms: inference::smooth_term_tests(self)?,
        })
    }

    /// Splits the flat coefficient vector into named parametric and smooth blocks.
    pub fn mapped_coefficients(&self) -> MappedCoefficients {
        let parametric = self
            .layout
            .parametric
            .iter()
            .map(|term| (term.label.clone(), self.coefficients[term.col]))
            .collect();
        let smooths = self
            .layout
            .smooths
            .iter()
            .map(|term| {
                (
                    term.label.clone(),
                    self.coefficients
                        .slice(s![term.col_range.clone()])
                        .to_vec(),
                )
            })
            .collect();
        MappedCoefficients { parametric, smooths }
    }
}

/// A structured representation of the fitted coefficients, keyed by term label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedCoefficients {
    pub parametric: BTreeMap<String, f64>,
    pub smooths: BTreeMap<String, Vec<f64>>,
}

/// One row of the parametric coefficient table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametricCoefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

/// Approximate significance test for one smooth term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothTermTest {
    pub term: String,
    pub edf: f64,
    /// Rank used for the truncated pseudo-inverse of the term covariance.
    pub ref_df: usize,
    pub f_value: f64,
    pub p_value: f64,
}

/// Everything a reader needs to judge a fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub n_obs: usize,
    pub total_edf: f64,
    pub residual_df: f64,
    pub scale: f64,
    pub r_squared: f64,
    pub reml_score: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub converged: bool,
    pub iterations: usize,
    pub parametric: Vec<ParametricCoefficient>,
    pub smooth_terms: Vec<SmoothTermTest>,
}

impl ModelSummary {
    /// Smooth terms with p-value below `alpha`, in layout order.
    pub fn significant_smooths(&self, alpha: f64) -> Vec<&SmoothTermTest> {
        self.smooth_terms
            .iter()
            .filter(|t| t.p_value < alpha)
            .collect()
    }
}

impl std::fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Parametric coefficients:")?;
        writeln!(
            f,
            "  {:<28} {:>11} {:>11} {:>9} {:>10}",
            "term", "estimate", "std.error", "t", "p"
        )?;
        for c in &self.parametric {
            writeln!(
                f,
                "  {:<28} {:>11.5} {:>11.5} {:>9.3} {:>10.3e}",
                c.term, c.estimate, c.std_error, c.t_value, c.p_value
            )?;
        }
        if !self.smooth_terms.is_empty() {
            writeln!(f, "Approximate significance of smooth terms:")?;
            writeln!(
                f,
                "  {:<42} {:>7} {:>7} {:>9} {:>10}",
                "term", "edf", "ref.df", "F", "p"
            )?;
            for t in &self.smooth_terms {
                writeln!(
                    f,
                    "  {:<42} {:>7.3} {:>7} {:>9.3} {:>10.3e}",
                    t.term, t.edf, t.ref_df, t.f_value, t.p_value
                )?;
            }
        }
        writeln!(
            f,
            "R-sq = {:.4}   REML = {:.4}   scale = {:.5}   n = {}",
            self.r_squared, self.reml_score, self.scale, self.n_obs
        )?;
        write!(
            f,
            "edf = {:.3}   logLik = {:.4}   AIC = {:.4}{}",
            self.total_edf,
            self.log_likelihood,
            self.aic,
            match (self.converged, self.iterations) {
                (true, _) => String::new(),
                (false, 0) => "   (smoothing-parameter search did not converge)".to_string(),
                (false, n) => format!(
                    "   (smoothing-parameter search did not converge after {n} BFGS iterations)"
                ),
            }
        )
    }
}
