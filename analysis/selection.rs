use crate::gam::inference::{LikelihoodRatioTest, likelihood_ratio_test};
use crate::models::{FittedModel, ModelKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("No fitted models to compare.")]
    NoModels,
    #[error("Model {0} has a non-finite AIC and cannot be ranked.")]
    NonFiniteAic(String),
}

/// The winning model, carrying the fit it refers to.
#[derive(Debug, Clone, Copy)]
pub enum SelectedModel<'a> {
    Covariates(&'a FittedModel),
    Spatial(&'a FittedModel),
    SpatioTemporal(&'a FittedModel),
}

impl<'a> SelectedModel<'a> {
    fn new(model: &'a FittedModel) -> Self {
        match model.kind {
            ModelKind::Covariates => SelectedModel::Covariates(model),
            ModelKind::Spatial => SelectedModel::Spatial(model),
            ModelKind::SpatioTemporal => SelectedModel::SpatioTemporal(model),
        }
    }

    pub fn model(&self) -> &'a FittedModel {
        match *self {
            SelectedModel::Covariates(m)
            | SelectedModel::Spatial(m)
            | SelectedModel::SpatioTemporal(m) => m,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.model().kind
    }
}

/// AIC row of the comparison table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AicEntry {
    pub model: ModelKind,
    pub n_obs: usize,
    pub edf: f64,
    pub aic: f64,
    /// `aic - min(aic)`.
    pub delta_aic: f64,
}

/// Likelihood-ratio test of one model against the next richer one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedComparison {
    pub smaller: ModelKind,
    pub larger: ModelKind,
    pub test: LikelihoodRatioTest,
}

/// Outcome of comparing the fitted models.
#[derive(Debug, Clone)]
pub struct ModelComparison<'a> {
    pub aic_table: Vec<AicEntry>,
    pub nested_tests: Vec<NestedComparison>,
    pub selected: SelectedModel<'a>,
}

impl ModelComparison<'_> {
    pub fn selected_kind(&self) -> ModelKind {
        self.selected.kind()
    }
}

/// Ranks models by AIC and runs the nested likelihood-ratio tests.
///
/// `models` must be in nesting order (A, B, C). Exactly equal AIC values go to
/// the earlier, simpler model.
pub fn compare_models(models: &[FittedModel]) -> Result<ModelComparison<'_>, SelectionError> {
    if models.is_empty() {
        return Err(SelectionError::NoModels);
    }
    if let Some(bad) = models.iter().find(|m| !m.aic().is_finite()) {
        return Err(SelectionError::NonFiniteAic(bad.kind.label().to_string()));
    }

    let mut best = &models[0];
    for candidate in &models[1..] {
        // Strict comparison keeps the earlier model on ties.
        if candidate.aic() < best.aic() {
            best = candidate;
        }
    }
    let min_aic = best.aic();

    let aic_table = models
        .iter()
        .map(|m| AicEntry {
            model: m.kind,
            n_obs: m.fit.n_obs,
            edf: m.fit.total_edf,
            aic: m.aic(),
            delta_aic: m.aic() - min_aic,
        })
        .collect();

    let nested_tests = models
        .windows(2)
        .map(|pair| {
            let (smaller, larger) = (&pair[0], &pair[1]);
            let comparable = smaller.row_indices == larger.row_indices;
            if !comparable {
                log::warn!(
                    "Models {} and {} were fitted on different rows; the likelihood-ratio test is not applicable.",
                    smaller.kind.label(),
                    larger.kind.label()
                );
            }
            NestedComparison {
                smaller: smaller.kind,
                larger: larger.kind,
                test: likelihood_ratio_test(&smaller.fit, &larger.fit, comparable),
            }
        })
        .collect();

    log::info!("Selected model {} with AIC {:.4}.", best.kind, min_aic);

    Ok(ModelComparison {
        aic_table,
        nested_tests,
        selected: SelectedModel::new(best),
    })
}

impl std::fmt::Display for ModelComparison<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  {:<5} {:>6} {:>9} {:>12} {:>9}", "model", "n", "edf", "AIC", "dAIC")?;
        for e in &self.aic_table {
            writeln!(
                f,
                "  {:<5} {:>6} {:>9.3} {:>12.4} {:>9.4}",
                e.model.label(),
                e.n_obs,
                e.edf,
                e.aic,
                e.delta_aic
            )?;
        }
        for t in &self.nested_tests {
            let verdict = match t.test.p_value {
                Some(p) => format!(
                    "chi2 = {:.3}, df = {:.3}, p = {:.4e} ({})",
                    t.test.statistic,
                    t.test.df,
                    p,
                    if t.test.justified { "extra complexity justified" } else { "not justified" }
                ),
                None => "not applicable".to_string(),
            };
            writeln!(f, "  {} vs {}: {verdict}", t.smaller.label(), t.larger.label())?;
        }
        write!(f, "Selected model: {}", self.selected.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gam::construction::{GamFormula, ModelLayout};
    use crate::gam::model::{FittedGam, ModelSummary};
    use ndarray::{Array1, Array2};

    fn fitted(kind: ModelKind, aic: f64, rss: f64, edf: f64, rows: Vec<usize>) -> FittedModel {
        let n = rows.len();
        let fit = FittedGam {
            layout: ModelLayout {
                parametric: vec![],
                smooths: vec![],
                total_coeffs: 0,
            },
            coefficients: Array1::zeros(0),
            covariance: Array2::zeros((0, 0)),
            lambdas: vec![],
            smooth_edf: vec![],
            total_edf: edf,
            fitted_values: Array1::zeros(n),
            residuals: Array1::zeros(n),
            rss,
            scale: rss / (n as f64 - edf),
            reml_score: 0.0,
            log_likelihood: 0.0,
            aic,
            n_obs: n,
            converged: true,
            iterations: 1,
        };
        let summary: ModelSummary = fit.summary().unwrap();
        FittedModel {
            kind,
            formula: GamFormula {
                response: "y".to_string(),
                factor_main_effect: false,
                smooths: vec![],
            },
            row_indices: rows,
            fit,
            summary,
        }
    }

    #[test]
    fn test_minimum_aic_wins() {
        let rows: Vec<usize> = (0..100).collect();
        let models = vec![
            fitted(ModelKind::Covariates, 120.0, 50.0, 10.0, rows.clone()),
            fitted(ModelKind::Spatial, 100.0, 30.0, 20.0, rows.clone()),
            fitted(ModelKind::SpatioTemporal, 105.0, 29.0, 30.0, rows),
        ];
        let comparison = compare_models(&models).unwrap();
        assert!(matches!(comparison.selected, SelectedModel::Spatial(_)));
        assert_eq!(comparison.aic_table[1].delta_aic, 0.0);

        let ab = &comparison.nested_tests[0].test;
        assert!(ab.p_value.unwrap() < 0.05);
        assert!(ab.justified);
        let bc = &comparison.nested_tests[1].test;
        assert!(!bc.justified);
    }

    #[test]
    fn test_ties_go_to_simpler_model() {
        let rows: Vec<usize> = (0..50).collect();
        let models = vec![
            fitted(ModelKind::Covariates, 80.0, 10.0, 5.0, rows.clone()),
            fitted(ModelKind::Spatial, 80.0, 9.0, 8.0, rows.clone()),
            fitted(ModelKind::SpatioTemporal, 80.0, 8.0, 12.0, rows),
        ];
        for _ in 0..3 {
            let comparison = compare_models(&models).unwrap();
            assert_eq!(comparison.selected_kind(), ModelKind::Covariates);
        }
    }

    #[test]
    fn test_different_rows_make_lrt_not_applicable() {
        let models = vec![
            fitted(ModelKind::Covariates, 90.0, 10.0, 5.0, (0..50).collect()),
            fitted(ModelKind::Spatial, 85.0, 9.0, 8.0, (1..50).collect()),
        ];
        let comparison = compare_models(&models).unwrap();
        assert_eq!(comparison.nested_tests.len(), 1);
        assert!(comparison.nested_tests[0].test.p_value.is_none());
        assert!(!comparison.nested_tests[0].test.justified);
    }

    #[test]
    fn test_empty_and_non_finite_inputs() {
        assert!(matches!(compare_models(&[]), Err(SelectionError::NoModels)));
        let models = vec![fitted(ModelKind::Covariates, f64::NAN, 1.0, 2.0, (0..10).collect())];
        assert!(matches!(compare_models(&models), Err(SelectionError::NonFiniteAic(_))));
    }
}
