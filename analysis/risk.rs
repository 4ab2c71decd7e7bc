//! Residual-based flagging of regions with unexpectedly high incidence.
//!
//! The threshold is a single type-7 percentile of every available residual of
//! the selected model, pooled across years. A row is flagged when its residual
//! is strictly greater than the threshold. For `N` distinct residuals and the
//! 95th percentile this flags exactly `ceil(0.05 * (N - 1))` rows, which is
//! always `floor(0.05 * N)` or `ceil(0.05 * N)`.

use crate::features::DerivedDataset;
use crate::selection::SelectedModel;
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_RISK_PERCENTILE: f64 = 0.95;

/// Per-row outcome of the risk analysis, aligned with the dataset.
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub percentile: f64,
    pub threshold: f64,
    pub residuals: Vec<Option<f64>>,
    pub fitted: Vec<Option<f64>>,
    pub high_risk: Vec<bool>,
    pub per_year: Vec<YearRiskCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearRiskCount {
    pub year: String,
    pub observations: usize,
    pub flagged: usize,
}

/// Serializable digest of a [`RiskAssessment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummary {
    pub percentile: f64,
    pub threshold: f64,
    pub residual_count: usize,
    pub flagged_count: usize,
    pub per_year: Vec<YearRiskCount>,
}

impl RiskAssessment {
    pub fn flagged_count(&self) -> usize {
        self.high_risk.iter().filter(|&&f| f).count()
    }

    pub fn residual_count(&self) -> usize {
        self.residuals.iter().flatten().count()
    }

    /// Flag per microregion for one year; regions without a row that year are absent.
    pub fn flagged_regions(&self, data: &DerivedDataset, year: &str) -> BTreeMap<String, bool> {
        data.records
            .iter()
            .zip(&self.high_risk)
            .filter(|(r, _)| r.year_label == year)
            .map(|(r, &flag)| (r.observation.microregion.clone(), flag))
            .collect()
    }

    pub fn summary(&self) -> RiskSummary {
        RiskSummary {
            percentile: self.percentile,
            threshold: self.threshold,
            residual_count: self.residual_count(),
            flagged_count: self.flagged_count(),
            per_year: self.per_year.clone(),
        }
    }
}

/// Flags rows whose residual under the selected model exceeds the pooled percentile.
pub fn assess(data: &DerivedDataset, selected: &SelectedModel, percentile: f64) -> RiskAssessment {
    let model = selected.model();
    let residuals = model.residuals_by_row(data.len());
    let fitted = model.fitted_by_row(data.len());

    let available: Vec<f64> = residuals.iter().flatten().copied().collect();
    let threshold = stats::quantile(&available, percentile);
    let high_risk: Vec<bool> = residuals
        .iter()
        .map(|r| r.is_some_and(|v| v > threshold))
        .collect();

    let per_year = data
        .year_levels
        .iter()
        .map(|year| {
            let (observations, flagged) = data
                .records
                .iter()
                .zip(residuals.iter().zip(&high_risk))
                .filter(|(rec, _)| &rec.year_label == year)
                .fold((0, 0), |(n, k), (_, (res, &flag))| {
                    (n + usize::from(res.is_some()), k + usize::from(flag))
                });
            YearRiskCount {
                year: year.clone(),
                observations,
                flagged,
            }
        })
        .collect();

    let assessment = RiskAssessment {
        percentile,
        threshold,
        residuals,
        fitted,
        high_risk,
        per_year,
    };
    log::info!(
        "Risk threshold (p{:.0}) = {threshold:.4}; {} of {} observations flagged as high risk.",
        percentile * 100.0,
        assessment.flagged_count(),
        assessment.residual_count()
    );
    assessment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CovariateValues, Observation};
    use crate::features::DerivedRecord;
    use crate::gam::construction::{GamFormula, ModelLayout};
    use crate::gam::model::FittedGam;
    use crate::models::{FittedModel, ModelKind};
    use crate::selection::compare_models;
    use ndarray::{Array1, Array2};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn dataset(n: usize) -> DerivedDataset {
        let records = (0..n)
            .map(|i| DerivedRecord {
                observation: Observation {
                    microregion: format!("R{}", i / 2),
                    year: 2013 + (i % 2) as i64,
                    tb_cases: 1,
                    population: 100,
                    longitude: None,
                    latitude: None,
                    covariates: CovariateValues::default(),
                },
                tb_rate: Some(0.01),
                log_tb_rate: Some(0.011_f64.ln()),
                year_label: (2013 + (i % 2)).to_string(),
            })
            .collect();
        DerivedDataset {
            records,
            year_levels: vec!["2013".to_string(), "2014".to_string()],
            ..DerivedDataset::default()
        }
    }

    fn model_with_residuals(rows: Vec<usize>, residuals: Vec<f64>) -> FittedModel {
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
            total_edf: 1.0,
            fitted_values: Array1::zeros(n),
            residuals: Array1::from(residuals),
            rss: 1.0,
            scale: 1.0,
            reml_score: 0.0,
            log_likelihood: 0.0,
            aic: 10.0,
            n_obs: n,
            converged: true,
            iterations: 1,
        };
        FittedModel {
            kind: ModelKind::Covariates,
            formula: GamFormula {
                response: "y".to_string(),
                factor_main_effect: false,
                smooths: vec![],
            },
            row_indices: rows,
            summary: fit.summary().unwrap(),
            fit,
        }
    }

    #[test]
    fn test_flag_count_is_within_rounding_of_five_percent() {
        let mut rng = StdRng::seed_from_u64(17);
        let normal = Normal::new(0.0, 1.0).unwrap();
        for &n in &[20usize, 37, 100, 253] {
            let data = dataset(n);
            let residuals: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
            let models = vec![model_with_residuals((0..n).collect(), residuals)];
            let comparison = compare_models(&models).unwrap();
            let risk = assess(&data, &comparison.selected, DEFAULT_RISK_PERCENTILE);
            let flagged = risk.flagged_count();
            let expected = (0.05 * (n - 1) as f64).ceil() as usize;
            assert_eq!(flagged, expected, "n = {n}");
            let lo = (0.05 * n as f64).floor() as usize;
            let hi = (0.05 * n as f64).ceil() as usize;
            assert!(flagged == lo || flagged == hi);
        }
    }

    #[test]
    fn test_rows_outside_fit_are_not_flagged() {
        let data = dataset(6);
        let models = vec![model_with_residuals(vec![0, 1, 3, 5], vec![0.1, 5.0, -0.2, 0.0])];
        let comparison = compare_models(&models).unwrap();
        let risk = assess(&data, &comparison.selected, 0.95);
        assert_eq!(risk.residuals[2], None);
        assert!(!risk.high_risk[2]);
        assert!(risk.high_risk[1]);
        assert_eq!(risk.flagged_count(), 1);
        assert_eq!(risk.residual_count(), 4);

        let y2014 = risk.per_year.iter().find(|y| y.year == "2014").unwrap();
        assert_eq!(y2014.observations, 3);
        assert_eq!(y2014.flagged, 1);
        let map = risk.flagged_regions(&data, "2014");
        assert_eq!(map.get("R0"), Some(&true));
        assert_eq!(map.len(), 3);
    }
}
