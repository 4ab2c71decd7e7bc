use crate::features::DerivedDataset;
use crate::stats;
use serde::{Deserialize, Serialize};

/// Incidence-rate statistics for one year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: String,
    pub mean_rate: f64,
    pub median_rate: f64,
    /// Sample standard deviation; `NaN` with fewer than two regions.
    pub sd_rate: f64,
    /// Rows with a non-missing rate in this year.
    pub n_regions: usize,
}

/// Per-year mean, median, SD and count of `tb_rate`, in year order.
pub fn summarize_by_year(data: &DerivedDataset) -> Vec<YearSummary> {
    data.year_levels
        .iter()
        .map(|year| {
            let rates: Vec<f64> = data
                .records
                .iter()
                .filter(|r| &r.year_label == year)
                .filter_map(|r| r.tb_rate)
                .collect();
            YearSummary {
                year: year.clone(),
                mean_rate: stats::mean(&rates),
                median_rate: stats::median(&rates),
                sd_rate: stats::sample_sd(&rates),
                n_regions: rates.len(),
            }
        })
        .collect()
}

pub fn format_table(summaries: &[YearSummary]) -> String {
    let mut out = format!(
        "  {:<6} {:>9} {:>12} {:>12} {:>12}\n",
        "year", "regions", "mean", "median", "sd"
    );
    for s in summaries {
        out.push_str(&format!(
            "  {:<6} {:>9} {:>12.6} {:>12.6} {:>12.6}\n",
            s.year, s.n_regions, s.mean_rate, s.median_rate, s.sd_rate
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CovariateValues, Dataset, Observation};
    use crate::features::derive_features;
    use approx::assert_abs_diff_eq;

    fn obs(region: &str, year: i64, cases: u64, population: u64) -> Observation {
        Observation {
            microregion: region.to_string(),
            year,
            tb_cases: cases,
            population,
            longitude: None,
            latitude: None,
            covariates: CovariateValues::default(),
        }
    }

    #[test]
    fn test_counts_and_means_use_only_present_rates() {
        let data = derive_features(Dataset::new(vec![
            obs("A", 2013, 10, 1000),
            obs("B", 2013, 30, 1000),
            obs("C", 2013, 5, 0),
            obs("A", 2014, 20, 1000),
        ]));
        let summary = summarize_by_year(&data);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].year, "2013");
        assert_eq!(summary[0].n_regions, 2);
        assert_abs_diff_eq!(summary[0].mean_rate, 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(summary[0].median_rate, 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(summary[0].sd_rate, 0.02_f64.sqrt() * 0.1, epsilon = 1e-12);
        assert_eq!(summary[1].n_regions, 1);
        assert!(summary[1].sd_rate.is_nan());
        assert!(format_table(&summary).contains("2014"));
    }
}
