//! Result persistence: a pretty-printed TOML artifact with everything the run
//! produced, and a CSV copy of the augmented observation table.

use crate::config::AnalysisConfig;
use crate::correlation::CorrelationMatrix;
use crate::data::Covariate;
use crate::explore::ExploratoryReport;
use crate::features::DerivedDataset;
use crate::gam::model::{MappedCoefficients, ModelSummary};
use crate::models::{FittedModel, ModelKind};
use crate::risk::{RiskAssessment, RiskSummary};
use crate::selection::{AicEntry, ModelComparison, NestedComparison};
use crate::temporal::YearSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const RESULTS_FILE: &str = "results.toml";
pub const OBSERVATIONS_FILE: &str = "augmented_observations.csv";

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize results to TOML: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
    #[error("Failed to parse results TOML: {0}")]
    TomlDeserialization(#[from] toml::de::Error),
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One observation with its derived fields and the selected model's outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedRecord {
    pub microregion: String,
    pub year: i64,
    pub year_label: String,
    pub tb_cases: u64,
    pub population: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tb_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_tb_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitted: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual: Option<f64>,
    pub high_risk: bool,
    /// Present covariates only, keyed by column name.
    pub covariates: BTreeMap<String, f64>,
}

/// Joins derived records with the risk analysis outputs, row by row.
pub fn augment(data: &DerivedDataset, risk: &RiskAssessment) -> Vec<AugmentedRecord> {
    data.records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let o = &r.observation;
            AugmentedRecord {
                microregion: o.microregion.clone(),
                year: o.year,
                year_label: r.year_label.clone(),
                tb_cases: o.tb_cases,
                population: o.population,
                longitude: o.longitude,
                latitude: o.latitude,
                tb_rate: r.tb_rate,
                log_tb_rate: r.log_tb_rate,
                fitted: risk.fitted.get(i).copied().flatten(),
                residual: risk.residuals.get(i).copied().flatten(),
                high_risk: risk.high_risk.get(i).copied().unwrap_or(false),
                covariates: Covariate::ALL
                    .iter()
                    .filter_map(|&c| Some((c.column().to_string(), o.covariates.get(c)?)))
                    .collect(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub kind: ModelKind,
    pub label: String,
    pub formula: String,
    pub lambdas: Vec<f64>,
    pub smooth_edf: Vec<f64>,
    pub summary: ModelSummary,
    pub coefficients: MappedCoefficients,
}

impl ModelRecord {
    pub fn from_fitted(model: &FittedModel) -> Self {
        Self {
            kind: model.kind,
            label: model.kind.label().to_string(),
            formula: model.formula.to_string(),
            lambdas: model.fit.lambdas.clone(),
            smooth_edf: model.fit.smooth_edf.clone(),
            summary: model.summary.clone(),
            coefficients: model.fit.mapped_coefficients(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub covariates: Vec<String>,
    /// Row-major matrix.
    pub values: Vec<Vec<f64>>,
}

impl From<&CorrelationMatrix> for CorrelationRecord {
    fn from(m: &CorrelationMatrix) -> Self {
        Self {
            covariates: m.covariates.iter().map(|c| c.column().to_string()).collect(),
            values: m.values.rows().into_iter().map(|r| r.to_vec()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub selected: ModelKind,
    pub aic_table: Vec<AicEntry>,
    pub nested_tests: Vec<NestedComparison>,
}

impl From<&ModelComparison<'_>> for ComparisonRecord {
    fn from(c: &ModelComparison<'_>) -> Self {
        Self {
            selected: c.selected_kind(),
            aic_table: c.aic_table.clone(),
            nested_tests: c.nested_tests.clone(),
        }
    }
}

/// The complete output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub config: AnalysisConfig,
    pub exploratory: ExploratoryReport,
    pub correlation: CorrelationRecord,
    pub models: Vec<ModelRecord>,
    pub comparison: ComparisonRecord,
    pub risk: RiskSummary,
    pub temporal: Vec<YearSummary>,
    pub observations: Vec<AugmentedRecord>,
}

impl AnalysisArtifact {
    /// Saves the artifact as pretty TOML, overwriting an existing file.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path).map_err(io_error(path))?);
        file.write_all(toml_string.as_bytes())
            .map_err(io_error(path))?;
        file.flush().map_err(io_error(path))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let toml_string = fs::read_to_string(path).map_err(io_error(path))?;
        Ok(toml::from_str(&toml_string)?)
    }
}

fn optional_cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "NA".to_string())
}

/// Writes the augmented observations as CSV with `NA` for missing cells.
pub fn write_observations_csv(path: &Path, records: &[AugmentedRecord]) -> Result<(), PersistError> {
    let file = fs::File::create(path).map_err(io_error(path))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    let mut header: Vec<&str> = vec![
        "microregion",
        "year",
        "tb_cases",
        "population",
        "longitude",
        "latitude",
    ];
    header.extend(Covariate::ALL.iter().map(|c| c.column()));
    header.extend(["tb_rate", "log_tb_rate", "year_label", "fitted", "residual", "high_risk"]);
    writer.write_record(&header)?;

    for r in records {
        let mut row = vec![
            r.microregion.clone(),
            r.year.to_string(),
            r.tb_cases.to_string(),
            r.population.to_string(),
            optional_cell(r.longitude),
            optional_cell(r.latitude),
        ];
        row.extend(
            Covariate::ALL
                .iter()
                .map(|c| optional_cell(r.covariates.get(c.column()).copied())),
        );
        row.extend([
            optional_cell(r.tb_rate),
            optional_cell(r.log_tb_rate),
            r.year_label.clone(),
            optional_cell(r.fitted),
            optional_cell(r.residual),
            r.high_risk.to_string(),
        ]);
        writer.write_record(&row)?;
    }
    writer.flush().map_err(io_error(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(region: &str, residual: Option<f64>, high_risk: bool) -> AugmentedRecord {
        let mut covariates = BTreeMap::new();
        covariates.insert("poverty_rate".to_string(), 31.5);
        AugmentedRecord {
            microregion: region.to_string(),
            year: 2013,
            year_label: "2013".to_string(),
            tb_cases: 10,
            population: 1000,
            longitude: Some(-50.0),
            latitude: None,
            tb_rate: Some(0.01),
            log_tb_rate: Some(0.011_f64.ln()),
            fitted: residual.map(|r| 0.011_f64.ln() - r),
            residual,
            high_risk,
            covariates,
        }
    }

    #[test]
    fn test_csv_marks_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OBSERVATIONS_FILE);
        write_observations_csv(&path, &[record("R1", Some(0.25), true), record("R2", None, false)])
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 6 + 8 + 6);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        let col = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&rows[0][col("latitude")], "NA");
        assert_eq!(&rows[0][col("poverty_rate")], "31.5");
        assert_eq!(&rows[0][col("illiteracy_rate")], "NA");
        assert_eq!(&rows[0][col("high_risk")], "true");
        assert_eq!(&rows[1][col("residual")], "NA");
    }

    #[test]
    fn test_augmented_records_survive_toml() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            observations: Vec<AugmentedRecord>,
        }
        let original = Wrapper {
            observations: vec![record("R1", Some(-0.5), false), record("R2", None, true)],
        };
        let text = toml::to_string_pretty(&original).unwrap();
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.observations, original.observations);
    }
}
