// Coefficient tables and hypothesis tests for fitted additive models.
//
//   - Parametric terms: t statistics on the residual degrees of freedom.
//   - Smooth terms: Wald statistic with a truncated pseudo-inverse of the
//     term's covariance block, referred to an F distribution.
//   - Nested models: chi-square likelihood-ratio test on the scaled change in RSS.
//
// Any test whose reference distribution cannot be built reports a NaN p-value.

use crate::gam::model::{FittedGam, ParametricCoefficient, SmoothTermTest};
use ndarray::s;
use ndarray_linalg::error::LinalgError;
use ndarray_linalg::{Eigh, UPLO};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Eigendecomposition of a term covariance block failed: {0}")]
    LinalgError(#[from] LinalgError),
}

/// Two-tailed p-value of a t statistic.
pub fn pvalue_t(t: f64, df: f64) -> f64 {
    if !t.is_finite() || !(df > 0.0) {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => f64::NAN,
    }
}

/// Upper-tail p-value of an F statistic.
pub fn pvalue_f(f: f64, df1: f64, df2: f64) -> f64 {
    if !f.is_finite() || f < 0.0 {
        return f64::NAN;
    }
    match FisherSnedecor::new(df1, df2) {
        Ok(dist) => 1.0 - dist.cdf(f),
        Err(_) => f64::NAN,
    }
}

/// Upper-tail p-value of a chi-square statistic.
pub fn pvalue_chi_squared(statistic: f64, df: f64) -> f64 {
    if !statistic.is_finite() {
        return f64::NAN;
    }
    match ChiSquared::new(df) {
        Ok(dist) => 1.0 - dist.cdf(statistic.max(0.0)),
        Err(_) => f64::NAN,
    }
}

/// Estimate, standard error, t and p for every unpenalized coefficient.
pub fn parametric_table(fit: &FittedGam) -> Vec<ParametricCoefficient> {
    let df = fit.residual_df();
    fit.layout
        .parametric
        .iter()
        .map(|term| {
            let estimate = fit.coefficients[term.col];
            let std_error = fit.covariance[[term.col, term.col]].max(0.0).sqrt();
            let t_value = if std_error > 0.0 {
                estimate / std_error
            } else {
                f64::NAN
            };
            ParametricCoefficient {
                term: term.label.clone(),
                estimate,
                std_error,
                t_value,
                p_value: pvalue_t(t_value, df),
            }
        })
        .collect()
}

/// Approximate Wald tests of `f_j = 0` for every smooth term.
///
/// The covariance block is inverted on its leading `r = max(1, round(edf))`
/// eigen-directions, and `T / r` is compared with `F(r, n - edf)`.
pub fn smooth_term_tests(fit: &FittedGam) -> Result<Vec<SmoothTermTest>, InferenceError> {
    let residual_df = fit.residual_df();
    let mut tests = Vec::with_capacity(fit.layout.smooths.len());

    for (term, &edf) in fit.layout.smooths.iter().zip(&fit.smooth_edf) {
        let range = term.col_range.clone();
        let beta = fit.coefficients.slice(s![range.clone()]);
        let v = fit.covariance.slice(s![range.clone(), range]).to_owned();
        let (eigenvalues, eigenvectors) = v.eigh(UPLO::Lower)?;

        let rank = (edf.round() as usize).clamp(1, beta.len().max(1));
        let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let max_ev = eigenvalues.iter().copied().fold(0.0_f64, f64::max);
        let statistic: f64 = order
            .iter()
            .take(rank)
            .filter(|&&i| eigenvalues[i] > max_ev * 1e-12 && eigenvalues[i] > 0.0)
            .map(|&i| {
                let projection = eigenvectors.column(i).dot(&beta);
                projection * projection / eigenvalues[i]
            })
            .sum();

        let f_value = statistic / rank as f64;
        tests.push(SmoothTermTest {
            term: term.label.clone(),
            edf,
            ref_df: rank,
            f_value,
            p_value: pvalue_f(f_value, rank as f64, residual_df),
        });
    }
    Ok(tests)
}

/// Outcome of comparing a model with a larger model that nests it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikelihoodRatioTest {
    /// `(RSS_smaller - RSS_larger) / scale_larger`.
    pub statistic: f64,
    /// Difference in effective degrees of freedom.
    pub df: f64,
    /// `None` when the test is not applicable to the pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    /// The larger model is preferred at the 5% level.
    pub justified: bool,
}

/// Significance level at which the extra complexity is accepted.
pub const LRT_ALPHA: f64 = 0.05;

/// Chi-square likelihood-ratio test of `smaller` nested in `larger`.
///
/// The test needs both fits to share their rows; callers that know the row
/// sets differ pass `comparable = false`.
pub fn likelihood_ratio_test(
    smaller: &FittedGam,
    larger: &FittedGam,
    comparable: bool,
) -> LikelihoodRatioTest {
    let statistic = (smaller.rss - larger.rss) / larger.scale;
    let df = larger.total_edf - smaller.total_edf;

    let p_value = if comparable && smaller.n_obs == larger.n_obs && df > 0.0 {
        let p = pvalue_chi_squared(statistic, df);
        if p.is_nan() { None } else { Some(p) }
    } else {
        None
    };

    LikelihoodRatioTest {
        statistic,
        df,
        p_value,
        justified: p_value.is_some_and(|p| p < LRT_ALPHA),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pvalue_t_matches_known_quantile() {
        // t = 2.228 is the two-sided 5% critical value on 10 df.
        assert_abs_diff_eq!(pvalue_t(2.228, 10.0), 0.05, epsilon = 1e-3);
        assert!(pvalue_t(1.0, 0.0).is_nan());
        assert!(pvalue_t(f64::INFINITY, 5.0).is_nan());
    }

    #[test]
    fn test_pvalue_f_and_chi_squared() {
        // F(3, 20) upper 5% point is 3.098.
        assert_abs_diff_eq!(pvalue_f(3.098, 3.0, 20.0), 0.05, epsilon = 1e-3);
        // Chi-square(1) upper 5% point is 3.841.
        assert_abs_diff_eq!(pvalue_chi_squared(3.841, 1.0), 0.05, epsilon = 1e-3);
        assert!(pvalue_chi_squared(1.0, -1.0).is_nan());
        assert_abs_diff_eq!(pvalue_chi_squared(-2.0, 2.0), 1.0, epsilon = 1e-12);
    }
}
