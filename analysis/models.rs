//! # Model Fitting
//!
//! The three nested additive models of `log_tb_rate`:
//!
//! - **A** (`Covariates`): one smooth per socio-economic covariate plus the year factor.
//! - **B** (`Spatial`): A plus an isotropic thin-plate surface over longitude and latitude.
//! - **C** (`SpatioTemporal`): B plus one spatial surface per year level.
//!
//! Each model keeps only the rows where the response and every predictor it
//! uses are present, so the three fits may see different rows. The original
//! row indices are kept with each fit.

use crate::data::Covariate;
use crate::features::DerivedDataset;
use crate::gam::basis::KnotStrategy;
use crate::gam::construction::{Factor, GamFormula, ModelFrame, SmoothSpec, build_design};
use crate::gam::estimate::{EstimationError, fit_gam};
use crate::gam::inference::InferenceError;
use crate::gam::model::{BasisConfig, FittedGam, ModelSummary, RemlConfig};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub const RESPONSE: &str = "log_tb_rate";
pub const YEAR_FACTOR: &str = "year_label";
const LONGITUDE: &str = "longitude";
const LATITUDE: &str = "latitude";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model {model} could not be fitted: {source}")]
    Estimation {
        model: ModelKind,
        #[source]
        source: EstimationError,
    },
    #[error("Model {model} was fitted but its summary failed: {source}")]
    Inference {
        model: ModelKind,
        #[source]
        source: InferenceError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Covariates,
    Spatial,
    SpatioTemporal,
}

impl ModelKind {
    /// In nesting order; the index doubles as the AIC tie-breaker.
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Covariates,
        ModelKind::Spatial,
        ModelKind::SpatioTemporal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Covariates => "A",
            ModelKind::Spatial => "B",
            ModelKind::SpatioTemporal => "C",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ModelKind::Covariates => "covariate smooths + year",
            ModelKind::Spatial => "A + spatial smooth",
            ModelKind::SpatioTemporal => "B + spatial smooth by year",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    fn uses_location(self) -> bool {
        !matches!(self, ModelKind::Covariates)
    }

    /// The additive formula this model fits.
    pub fn formula(self, config: &ModelingConfig) -> GamFormula {
        let mut smooths: Vec<SmoothSpec> = Covariate::ALL
            .iter()
            .map(|c| SmoothSpec::PSpline {
                variable: c.column().to_string(),
                basis: config.covariate_basis.clone(),
            })
            .collect();
        if self.uses_location() {
            smooths.push(SmoothSpec::ThinPlate {
                x: LONGITUDE.to_string(),
                y: LATITUDE.to_string(),
                num_knots: config.spatial_knots,
            });
        }
        if self == ModelKind::SpatioTemporal {
            smooths.push(SmoothSpec::ThinPlateByFactor {
                x: LONGITUDE.to_string(),
                y: LATITUDE.to_string(),
                num_knots: config.spatial_knots,
            });
        }
        GamFormula {
            response: RESPONSE.to_string(),
            factor_main_effect: true,
            smooths,
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.description())
    }
}

/// Basis sizes, penalties and optimizer settings shared by the three models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelingConfig {
    /// Upper bound on thin-plate knots; fewer distinct locations lower it.
    pub spatial_knots: usize,
    /// Adds a shrinkage penalty on each smooth's null space.
    pub null_space_penalty: bool,
    pub covariate_basis: BasisConfig,
    pub reml: RemlConfig,
}

impl Default for ModelingConfig {
    fn default() -> Self {
        Self {
            spatial_knots: 30,
            null_space_penalty: false,
            covariate_basis: BasisConfig {
                num_knots: 6,
                degree: 3,
                penalty_order: 2,
                knot_strategy: KnotStrategy::Uniform,
            },
            reml: RemlConfig::default(),
        }
    }
}

/// One fitted model with the dataset rows it was fitted on.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub kind: ModelKind,
    pub formula: GamFormula,
    /// Dataset row index of each fitted observation, ascending.
    pub row_indices: Vec<usize>,
    pub fit: FittedGam,
    pub summary: ModelSummary,
}

impl FittedModel {
    /// Residuals aligned to the full dataset; rows left out of the fit are `None`.
    pub fn residuals_by_row(&self, n_rows: usize) -> Vec<Option<f64>> {
        scatter_rows(&self.row_indices, &self.fit.residuals, n_rows)
    }

    /// Fitted values aligned to the full dataset.
    pub fn fitted_by_row(&self, n_rows: usize) -> Vec<Option<f64>> {
        scatter_rows(&self.row_indices, &self.fit.fitted_values, n_rows)
    }

    pub fn aic(&self) -> f64 {
        self.fit.aic
    }
}

fn scatter_rows(indices: &[usize], values: &Array1<f64>, n_rows: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; n_rows];
    for (&row, &v) in indices.iter().zip(values.iter()) {
        if let Some(slot) = out.get_mut(row) {
            *slot = Some(v);
        }
    }
    out
}

/// Complete-case model frame for `kind`, with the row indices it kept.
pub fn model_frame(data: &DerivedDataset, kind: ModelKind) -> (ModelFrame, Vec<usize>) {
    let mut row_indices = Vec::new();
    let mut response = Vec::new();
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut years = Vec::new();

    for (idx, record) in data.records.iter().enumerate() {
        let Some(y) = record.log_tb_rate else { continue };
        let covariates: Option<Vec<f64>> = Covariate::ALL
            .iter()
            .map(|&c| record.observation.covariates.get(c))
            .collect();
        let Some(covariates) = covariates else { continue };
        let location = record.observation.location();
        if kind.uses_location() && location.is_none() {
            continue;
        }

        row_indices.push(idx);
        response.push(y);
        years.push(record.year_label.clone());
        for (c, v) in Covariate::ALL.iter().zip(covariates) {
            columns.entry(c.column().to_string()).or_default().push(v);
        }
        if let (true, Some((lon, lat))) = (kind.uses_location(), location) {
            columns.entry(LONGITUDE.to_string()).or_default().push(lon);
            columns.entry(LATITUDE.to_string()).or_default().push(lat);
        }
    }

    // Levels are taken from the kept rows so that no contrast column is empty.
    let levels: Vec<String> = years
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let codes = years
        .iter()
        .map(|y| levels.iter().position(|l| l == y).unwrap_or(0))
        .collect();

    let frame = ModelFrame {
        response: Array1::from_vec(response),
        numeric: columns
            .into_iter()
            .map(|(k, v)| (k, Array1::from_vec(v)))
            .collect(),
        factor: Some(Factor {
            name: YEAR_FACTOR.to_string(),
            levels,
            codes,
        }),
    };
    (frame, row_indices)
}

/// Fits one model on its complete cases.
pub fn fit_model(
    data: &DerivedDataset,
    kind: ModelKind,
    config: &ModelingConfig,
) -> Result<FittedModel, ModelError> {
    let (frame, row_indices) = model_frame(data, kind);
    let formula = kind.formula(config);
    let dropped = data.len() - row_indices.len();
    log::info!(
        "Fitting model {kind} on {} rows ({dropped} rows with missing values excluded).",
        row_indices.len()
    );

    let design = build_design(&frame, &formula, config.null_space_penalty)
        .map_err(|source| ModelError::Estimation { model: kind, source })?;
    let fit = fit_gam(&design, frame.response.view(), &config.reml)
        .map_err(|source| ModelError::Estimation { model: kind, source })?;
    if !fit.converged {
        log::warn!(
            "Model {} smoothing-parameter search did not converge; results use the best point found.",
            kind.label()
        );
    }
    let summary = fit
        .summary()
        .map_err(|source| ModelError::Inference { model: kind, source })?;

    Ok(FittedModel {
        kind,
        formula,
        row_indices,
        fit,
        summary,
    })
}

/// Fits A, B and C in order.
pub fn fit_all(data: &DerivedDataset, config: &ModelingConfig) -> Result<Vec<FittedModel>, ModelError> {
    ModelKind::ALL
        .iter()
        .map(|&kind| fit_model(data, kind, config))
        .collect()
}
