use crate::data::Covariate;
use crate::features::DerivedDataset;
use crate::stats::ColumnSummary;
use serde::{Deserialize, Serialize};

/// Descriptive overview of the derived dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploratoryReport {
    pub rows: usize,
    pub columns: usize,
    pub regions: usize,
    pub years: Vec<String>,
    pub summaries: Vec<ColumnSummary>,
}

impl ExploratoryReport {
    /// Columns with at least one missing cell, as `(name, missing)`.
    pub fn missingness(&self) -> Vec<(&str, usize)> {
        self.summaries
            .iter()
            .filter(|s| s.missing > 0)
            .map(|s| (s.name.as_str(), s.missing))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.summaries.iter().find(|s| s.name == name)
    }
}

/// `tb_rate`, `log_tb_rate` and `year_label`.
const DERIVED_COLUMNS: usize = 3;

pub fn summarize(data: &DerivedDataset) -> ExploratoryReport {
    let records = &data.records;
    let mut summaries = vec![
        ColumnSummary::from_options(
            "tb_cases",
            records.iter().map(|r| Some(r.observation.tb_cases as f64)),
        ),
        ColumnSummary::from_options(
            "population",
            records.iter().map(|r| Some(r.observation.population as f64)),
        ),
        ColumnSummary::from_options("tb_rate", records.iter().map(|r| r.tb_rate)),
        ColumnSummary::from_options("log_tb_rate", records.iter().map(|r| r.log_tb_rate)),
        ColumnSummary::from_options("longitude", records.iter().map(|r| r.observation.longitude)),
        ColumnSummary::from_options("latitude", records.iter().map(|r| r.observation.latitude)),
    ];
    summaries.extend(Covariate::ALL.iter().map(|&c| {
        ColumnSummary::from_options(
            c.column(),
            records.iter().map(|r| r.observation.covariates.get(c)),
        )
    }));

    let regions = records
        .iter()
        .map(|r| r.observation.microregion.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    ExploratoryReport {
        rows: records.len(),
        columns: data.input_columns + DERIVED_COLUMNS,
        regions,
        years: data.year_levels.clone(),
        summaries,
    }
}

impl std::fmt::Display for ExploratoryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} rows x {} columns; {} microregions; years {}",
            self.rows,
            self.columns,
            self.regions,
            self.years.join(", ")
        )?;
        writeln!(
            f,
            "  {:<24} {:>6} {:>7} {:>11} {:>11} {:>11} {:>11} {:>11} {:>11}",
            "column", "n", "missing", "min", "q1", "median", "mean", "q3", "max"
        )?;
        for s in &self.summaries {
            writeln!(
                f,
                "  {:<24} {:>6} {:>7} {:>11.4} {:>11.4} {:>11.4} {:>11.4} {:>11.4} {:>11.4}",
                s.name, s.n, s.missing, s.min, s.q1, s.median, s.mean, s.q3, s.max
            )?;
        }
        let missing = self.missingness();
        if missing.is_empty() {
            write!(f, "No missing values.")
        } else {
            let parts: Vec<String> = missing.iter().map(|(n, m)| format!("{n} ({m})")).collect();
            write!(f, "Missing values: {}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CovariateValues, Dataset, Observation};
    use crate::features::derive_features;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_summary_counts_and_missingness() {
        let mut covariates = CovariateValues::default();
        covariates.set(Covariate::PovertyRate, Some(20.0));
        let observations = vec![
            Observation {
                microregion: "A".to_string(),
                year: 2013,
                tb_cases: 10,
                population: 1000,
                longitude: Some(-50.0),
                latitude: None,
                covariates,
            },
            Observation {
                microregion: "B".to_string(),
                year: 2014,
                tb_cases: 30,
                population: 1000,
                longitude: Some(-49.0),
                latitude: Some(-9.0),
                covariates: CovariateValues::default(),
            },
        ];
        let report = summarize(&derive_features(Dataset::new(observations)));
        assert_eq!(report.rows, 2);
        assert_eq!(report.regions, 2);
        assert_eq!(report.years, vec!["2013", "2014"]);
        let rate = report.column("tb_rate").unwrap();
        assert_eq!(rate.n, 2);
        assert_abs_diff_eq!(rate.mean, 0.02, epsilon = 1e-12);
        assert_eq!(report.column("latitude").unwrap().missing, 1);
        assert_eq!(report.column("poverty_rate").unwrap().missing, 1);
        assert_eq!(report.column("illiteracy_rate").unwrap().missing, 2);
        assert!(report.to_string().contains("latitude (1)"));
        assert_eq!(report.columns, 17);
    }

    #[test]
    fn test_column_count_follows_the_input_width() {
        let mut dataset = Dataset::new(Vec::new());
        dataset.input_columns = 20;
        let report = summarize(&derive_features(dataset));
        assert_eq!(report.columns, 23);
        assert!(report.to_string().starts_with("0 rows x 23 columns"));
    }
}
