use crate::models::ModelingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Everything one run needs; saved with the results so the run can be repeated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Residual percentile above which a row is flagged, in (0, 1).
    pub risk_percentile: f64,
    /// Number of colour bins on the maps.
    pub map_bins: usize,
    /// Year shown on the risk map; the latest year when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_year: Option<i64>,
    pub plots: bool,
    pub modeling: ModelingConfig,
}

impl AnalysisConfig {
    pub fn new(input: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input,
            output_dir,
            risk_percentile: crate::risk::DEFAULT_RISK_PERCENTILE,
            map_bins: 5,
            map_year: None,
            plots: true,
            modeling: ModelingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(name: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::InvalidValue {
                name,
                reason: reason.into(),
            })
        }

        let basis = &self.modeling.covariate_basis;
        if basis.degree < 1 {
            return invalid("spline-degree", "must be at least 1");
        }
        if basis.penalty_order < 1 {
            return invalid("penalty-order", "must be at least 1");
        }
        if basis.penalty_order >= basis.num_knots + basis.degree + 1 {
            return invalid(
                "penalty-order",
                format!(
                    "must be smaller than the number of basis functions ({})",
                    basis.num_knots + basis.degree + 1
                ),
            );
        }
        if self.modeling.spatial_knots < 3 {
            return invalid("spatial-knots", "a thin-plate surface needs at least 3 knots");
        }
        if self.modeling.reml.max_iterations == 0 {
            return invalid("reml-max-iterations", "must be positive");
        }
        if !(self.modeling.reml.convergence_tolerance > 0.0) {
            return invalid("reml-convergence-tolerance", "must be positive");
        }
        if !(self.risk_percentile > 0.0 && self.risk_percentile < 1.0) {
            return invalid("risk-percentile", "must lie strictly between 0 and 1");
        }
        if self.map_bins == 0 || self.map_bins > 9 {
            return invalid("map-bins", "must be between 1 and 9");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::new("in.csv".into(), "out".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = AnalysisConfig::new("in.csv".into(), "out".into());
        config.risk_percentile = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { name: "risk-percentile", .. })
        ));

        let mut config = AnalysisConfig::new("in.csv".into(), "out".into());
        config.modeling.covariate_basis.penalty_order = 10;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::new("in.csv".into(), "out".into());
        config.map_bins = 0;
        assert!(config.validate().is_err());
    }
}
