use crate::data::{Dataset, Observation};

/// Added to the rate before taking logs so that zero-case regions stay finite.
pub const LOG_RATE_OFFSET: f64 = 0.001;

/// An observation together with the quantities derived from it.
///
/// The rate fields are only ever filled in by [`derive_features`].
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub observation: Observation,
    /// `tb_cases / population`; `None` when the population is zero.
    pub tb_rate: Option<f64>,
    /// `ln(tb_rate + LOG_RATE_OFFSET)`.
    pub log_tb_rate: Option<f64>,
    /// The year as a categorical level.
    pub year_label: String,
}

/// Records with derived fields, plus the sorted levels of the year factor.
#[derive(Debug, Clone, Default)]
pub struct DerivedDataset {
    pub records: Vec<DerivedRecord>,
    /// Ascending; the first level is the reference level.
    pub year_levels: Vec<String>,
    /// Width of the input table the records were loaded from.
    pub input_columns: usize,
}

impl DerivedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Computes incidence rates, log rates and year labels for every row.
///
/// Rows are never dropped. A zero population leaves both rates missing and is
/// reported once as a warning.
pub fn derive_features(dataset: Dataset) -> DerivedDataset {
    let years = dataset.years();
    let input_columns = dataset.input_columns;
    let mut zero_population = 0usize;

    let records: Vec<DerivedRecord> = dataset
        .observations
        .into_iter()
        .map(|observation| {
            let tb_rate = if observation.population == 0 {
                zero_population += 1;
                None
            } else {
                Some(observation.tb_cases as f64 / observation.population as f64)
            };
            DerivedRecord {
                year_label: observation.year.to_string(),
                log_tb_rate: tb_rate.map(|r| (r + LOG_RATE_OFFSET).ln()),
                tb_rate,
                observation,
            }
        })
        .collect();

    if zero_population > 0 {
        log::warn!(
            "{zero_population} rows have zero population; their incidence rate is treated as missing."
        );
    }

    DerivedDataset {
        records,
        year_levels: years.iter().map(i64::to_string).collect(),
        input_columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CovariateValues;
    use approx::assert_abs_diff_eq;

    fn observation(region: &str, year: i64, cases: u64, population: u64) -> Observation {
        Observation {
            microregion: region.to_string(),
            year,
            tb_cases: cases,
            population,
            longitude: Some(-50.0),
            latitude: Some(-10.0),
            covariates: CovariateValues::default(),
        }
    }

    #[test]
    fn test_rate_and_log_rate() {
        let data = Dataset::new(vec![observation("R1", 2013, 10, 1000)]);
        let derived = derive_features(data);
        let record = &derived.records[0];
        assert_abs_diff_eq!(record.tb_rate.unwrap(), 0.01, epsilon = 1e-15);
        assert_abs_diff_eq!(record.log_tb_rate.unwrap(), (0.011_f64).ln(), epsilon = 1e-15);
        assert_abs_diff_eq!(record.log_tb_rate.unwrap(), -4.5098, epsilon = 1e-4);
        assert_eq!(record.year_label, "2013");
    }

    #[test]
    fn test_zero_cases_stay_finite() {
        let derived = derive_features(Dataset::new(vec![observation("R1", 2013, 0, 5000)]));
        assert_eq!(derived.records[0].tb_rate, Some(0.0));
        assert_abs_diff_eq!(
            derived.records[0].log_tb_rate.unwrap(),
            LOG_RATE_OFFSET.ln(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_zero_population_is_missing_not_dropped() {
        let derived = derive_features(Dataset::new(vec![
            observation("R1", 2014, 3, 0),
            observation("R2", 2013, 3, 300),
        ]));
        assert_eq!(derived.len(), 2);
        assert_eq!(derived.records[0].tb_rate, None);
        assert_eq!(derived.records[0].log_tb_rate, None);
        assert_eq!(derived.year_levels, vec!["2013", "2014"]);
        assert_eq!(derived.records[0].year_label, derived.year_levels[1]);
    }

    #[test]
    fn test_log_rate_is_monotone_in_rate() {
        let derived = derive_features(Dataset::new(
            (0..20)
                .map(|i| observation("R", 2013, i * 7, 1000))
                .collect(),
        ));
        for pair in derived.records.windows(2) {
            assert!(pair[0].tb_rate < pair[1].tb_rate);
            assert!(pair[0].log_tb_rate < pair[1].log_tb_rate);
        }
    }
}
