//! # Data Loading and Validation
//!
//! Reads the microregion panel (one row per region and year) from a delimited
//! text file and validates it against a fixed schema.
//!
//! - Strict schema: column names are not configurable. `microregion`, `year`,
//!   `tb_cases` and `population` are required and complete; coordinates and
//!   the eight socio-economic covariates are required columns whose cells may
//!   be missing (`NA` or empty).
//! - User-centric errors: failures are assumed to be input errors and the
//!   `DataError` enum names the offending column.
//! - Loading goes through the polars `CsvReader`.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// The eight socio-economic covariates, in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Covariate {
    IndigenousShare,
    IlliteracyRate,
    UrbanisationLevel,
    PopulationDensity,
    PovertyRate,
    PoorSanitationShare,
    UnemploymentRate,
    HealthcareTimeliness,
}

impl Covariate {
    pub const ALL: [Covariate; 8] = [
        Covariate::IndigenousShare,
        Covariate::IlliteracyRate,
        Covariate::UrbanisationLevel,
        Covariate::PopulationDensity,
        Covariate::PovertyRate,
        Covariate::PoorSanitationShare,
        Covariate::UnemploymentRate,
        Covariate::HealthcareTimeliness,
    ];

    /// Column name in the input file.
    pub fn column(self) -> &'static str {
        match self {
            Covariate::IndigenousShare => "indigenous_share",
            Covariate::IlliteracyRate => "illiteracy_rate",
            Covariate::UrbanisationLevel => "urbanisation_level",
            Covariate::PopulationDensity => "population_density",
            Covariate::PovertyRate => "poverty_rate",
            Covariate::PoorSanitationShare => "poor_sanitation_share",
            Covariate::UnemploymentRate => "unemployment_rate",
            Covariate::HealthcareTimeliness => "healthcare_timeliness",
        }
    }

    /// Short human-readable label for plots and reports.
    pub fn label(self) -> &'static str {
        match self {
            Covariate::IndigenousShare => "Indigenous (%)",
            Covariate::IlliteracyRate => "Illiteracy (%)",
            Covariate::UrbanisationLevel => "Urbanisation (%)",
            Covariate::PopulationDensity => "Pop. density",
            Covariate::PovertyRate => "Poverty (%)",
            Covariate::PoorSanitationShare => "Poor sanitation (%)",
            Covariate::UnemploymentRate => "Unemployment (%)",
            Covariate::HealthcareTimeliness => "Timely care (%)",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Covariate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Covariate values of one observation; `None` marks a missing cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CovariateValues([Option<f64>; 8]);

impl CovariateValues {
    pub fn get(&self, covariate: Covariate) -> Option<f64> {
        self.0[covariate.index()]
    }

    pub fn set(&mut self, covariate: Covariate, value: Option<f64>) {
        self.0[covariate.index()] = value;
    }
}

/// One input row: a microregion in one year.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub microregion: String,
    pub year: i64,
    pub tb_cases: u64,
    pub population: u64,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub covariates: CovariateValues,
}

impl Observation {
    /// Both coordinates, when neither is missing.
    pub fn location(&self) -> Option<(f64, f64)> {
        Some((self.longitude?, self.latitude?))
    }
}

/// The validated input table, in file order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub observations: Vec<Observation>,
    /// Number of columns in the source table, extra columns included.
    pub input_columns: usize,
}

impl Dataset {
    /// A dataset built in memory, with exactly the schema columns.
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            input_columns: SCHEMA_COLUMNS,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> Vec<i64> {
        self.observations
            .iter()
            .map(|o| o.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct microregion identifiers, sorted.
    pub fn regions(&self) -> Vec<String> {
        self.observations
            .iter()
            .map(|o| o.microregion.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error while reading '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing values were found in the column '{0}', which must be complete."
    )]
    MissingValuesFound(String),
    #[error("Column '{column_name}' holds a negative count ({value}) at data row {row}.")]
    NegativeCount {
        column_name: String,
        value: i64,
        row: usize,
    },
    #[error("Input file contains only {found} data rows, but at least {required} are required.")]
    InsufficientRows { found: usize, required: usize },
}

pub const REQUIRED_COLUMNS: [&str; 6] = [
    "microregion",
    "year",
    "tb_cases",
    "population",
    "longitude",
    "latitude",
];

/// Identifier and count columns plus the eight covariates.
pub const SCHEMA_COLUMNS: usize = REQUIRED_COLUMNS.len() + Covariate::ALL.len();

/// Loads and validates the microregion panel.
///
/// Tab is used as the separator for `.tsv` and `.tab` files, comma otherwise.
pub fn load_dataset(path: &Path) -> Result<Dataset, DataError> {
    let separator = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => b'\t',
        _ => b',',
    };
    log::info!("Loading data from '{}'", path.display());

    let file = File::open(path).map_err(|source| DataError::IoError {
        path: path.display().to_string(),
        source,
    })?;
    let df = CsvReader::new(file)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(
                    CsvParseOptions::default()
                        .with_separator(separator)
                        .with_null_values(Some(NullValues::AllColumnsSingle("NA".into()))),
                ),
        )
        .finish()?;

    internal::validate_frame(df)
}

mod internal {
    use super::*;

    const MINIMUM_ROWS: usize = 1;

    pub(super) fn validate_frame(df: DataFrame) -> Result<Dataset, DataError> {
        if df.height() < MINIMUM_ROWS {
            return Err(DataError::InsufficientRows {
                found: df.height(),
                required: MINIMUM_ROWS,
            });
        }

        let columns_set: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let required = REQUIRED_COLUMNS
            .iter()
            .copied()
            .chain(Covariate::ALL.iter().map(|c| c.column()));
        for name in required {
            if !columns_set.contains(name) {
                return Err(DataError::ColumnNotFound(name.to_string()));
            }
        }

        let microregion = string_column(&df, "microregion")?;
        let year = complete_integer_column(&df, "year")?;
        let tb_cases = count_column(&df, "tb_cases")?;
        let population = count_column(&df, "population")?;
        let longitude = optional_float_column(&df, "longitude")?;
        let latitude = optional_float_column(&df, "latitude")?;
        let covariate_columns = Covariate::ALL
            .iter()
            .map(|c| optional_float_column(&df, c.column()))
            .collect::<Result<Vec<_>, _>>()?;

        let observations = (0..df.height())
            .map(|row| {
                let mut covariates = CovariateValues::default();
                for (covariate, values) in Covariate::ALL.iter().zip(&covariate_columns) {
                    covariates.set(*covariate, values[row]);
                }
                Observation {
                    microregion: microregion[row].clone(),
                    year: year[row],
                    tb_cases: tb_cases[row],
                    population: population[row],
                    longitude: longitude[row],
                    latitude: latitude[row],
                    covariates,
                }
            })
            .collect::<Vec<_>>();

        let dataset = Dataset {
            observations,
            input_columns: df.width(),
        };
        log::info!(
            "Loaded {} rows covering {} microregions and {} years.",
            dataset.len(),
            dataset.regions().len(),
            dataset.years().len()
        );
        Ok(dataset)
    }

    fn cast_column(
        df: &DataFrame,
        column_name: &str,
        dtype: DataType,
        expected_type: &'static str,
    ) -> Result<Column, DataError> {
        let series = df.column(column_name)?;
        let wrong_type = || DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type,
            found_type: format!("{:?}", series.dtype()),
        };
        let casted = series.cast(&dtype).map_err(|_| wrong_type())?;
        // A non-strict cast turns unparsable cells into nulls.
        if casted.null_count() > series.null_count() {
            return Err(wrong_type());
        }
        Ok(casted)
    }

    fn string_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
        let casted = cast_column(df, column_name, DataType::String, "string")?;
        if casted.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }
        Ok(casted
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect())
    }

    fn complete_integer_column(df: &DataFrame, column_name: &str) -> Result<Vec<i64>, DataError> {
        let casted = cast_column(df, column_name, DataType::Int64, "i64 (integer)")?;
        if casted.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }
        Ok(casted.i64()?.into_iter().map(|v| v.unwrap_or_default()).collect())
    }

    fn count_column(df: &DataFrame, column_name: &str) -> Result<Vec<u64>, DataError> {
        complete_integer_column(df, column_name)?
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                u64::try_from(value).map_err(|_| DataError::NegativeCount {
                    column_name: column_name.to_string(),
                    value,
                    row: i + 1,
                })
            })
            .collect()
    }

    fn optional_float_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<Option<f64>>, DataError> {
        let casted = cast_column(df, column_name, DataType::Float64, "f64 (numeric)")?;
        Ok(casted
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "microregion,year,tb_cases,population,longitude,latitude,indigenous_share,illiteracy_rate,urbanisation_level,population_density,poverty_rate,poor_sanitation_share,unemployment_rate,healthcare_timeliness";

    fn write_csv(suffix: &str, body: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{body}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_with_missing_covariates() {
        let body = format!(
            "{HEADER}\nR1,2013,10,1000,-50.1,-10.2,1.5,NA,60,12.5,30,,8.1,70\nR2,2014,0,2500,-49.0,-11.0,0.5,12,55,NA,28,40,7.5,65\n"
        );
        let file = write_csv(".csv", &body);
        let data = load_dataset(file.path()).unwrap();
        assert_eq!(data.len(), 2);
        let first = &data.observations[0];
        assert_eq!(first.microregion, "R1");
        assert_eq!(first.year, 2013);
        assert_eq!(first.tb_cases, 10);
        assert_eq!(first.population, 1000);
        assert_eq!(first.location(), Some((-50.1, -10.2)));
        assert_eq!(first.covariates.get(Covariate::IlliteracyRate), None);
        assert_eq!(first.covariates.get(Covariate::PoorSanitationShare), None);
        assert_eq!(first.covariates.get(Covariate::PovertyRate), Some(30.0));
        assert_eq!(
            data.observations[1].covariates.get(Covariate::PopulationDensity),
            None
        );
        assert_eq!(data.years(), vec![2013, 2014]);
    }

    #[test]
    fn test_tab_separated_by_extension() {
        let body = format!(
            "{}\nR1\t2013\t5\t500\t-50\t-10\t1\t2\t3\t4\t5\t6\t7\t8\n",
            HEADER.replace(',', "\t")
        );
        let file = write_csv(".tsv", &body);
        let data = load_dataset(file.path()).unwrap();
        assert_eq!(data.observations[0].tb_cases, 5);
        assert_eq!(
            data.observations[0].covariates.get(Covariate::HealthcareTimeliness),
            Some(8.0)
        );
    }

    #[test]
    fn test_extra_columns_are_kept_in_the_width() {
        let body = format!("{HEADER},notes\nR1,2013,5,500,-50,-10,1,2,3,4,5,6,7,8,coastal\n");
        let file = write_csv(".csv", &body);
        let data = load_dataset(file.path()).unwrap();
        assert_eq!(data.input_columns, SCHEMA_COLUMNS + 1);
        assert_eq!(Dataset::new(Vec::new()).input_columns, SCHEMA_COLUMNS);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let header = HEADER.replace(",poverty_rate", "");
        let body = format!("{header}\nR1,2013,10,1000,-50,-10,1,2,3,4,6,7,8\n");
        let file = write_csv(".csv", &body);
        match load_dataset(file.path()) {
            Err(DataError::ColumnNotFound(name)) => assert_eq!(name, "poverty_rate"),
            other => panic!("expected ColumnNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_case_count_is_rejected() {
        let body = format!("{HEADER}\nR1,2013,NA,1000,-50,-10,1,2,3,4,5,6,7,8\n");
        let file = write_csv(".csv", &body);
        assert!(matches!(
            load_dataset(file.path()),
            Err(DataError::MissingValuesFound(name)) if name == "tb_cases"
        ));
    }

    #[test]
    fn test_negative_population_is_rejected() {
        let body = format!("{HEADER}\nR1,2013,3,-1000,-50,-10,1,2,3,4,5,6,7,8\n");
        let file = write_csv(".csv", &body);
        assert!(matches!(
            load_dataset(file.path()),
            Err(DataError::NegativeCount { row: 1, .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_dataset(&dir.path().join("absent.csv"));
        assert!(matches!(result, Err(DataError::IoError { .. })));
    }
}
