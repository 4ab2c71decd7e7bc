//! Small descriptive-statistics helpers shared by the reporting stages.

use serde::{Deserialize, Serialize};

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (denominator `n - 1`); `NaN` when `n < 2`.
pub fn sample_sd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Quantile with linear interpolation between order statistics (R type 7).
///
/// `sorted` must be ascending. Returns `NaN` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Sorts a copy of `values` and takes the type-7 quantile.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, p)
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Summary of one numeric column, missing cells counted separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub n: usize,
    pub missing: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub mean: f64,
    pub q3: f64,
    pub max: f64,
}

impl ColumnSummary {
    pub fn from_options<I>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut missing = 0usize;
        let mut present = Vec::new();
        for value in values {
            match value {
                Some(v) if v.is_finite() => present.push(v),
                _ => missing += 1,
            }
        }
        present.sort_by(f64::total_cmp);
        Self {
            name: name.to_string(),
            n: present.len(),
            missing,
            min: present.first().copied().unwrap_or(f64::NAN),
            q1: quantile_sorted(&present, 0.25),
            median: quantile_sorted(&present, 0.5),
            mean: mean(&present),
            q3: quantile_sorted(&present, 0.75),
            max: present.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Standard normal quantile; `NaN` outside the open unit interval.
pub fn normal_quantile(p: f64) -> f64 {
    use statrs::distribution::{ContinuousCDF, Normal};
    match Normal::new(0.0, 1.0) {
        Ok(dist) if p > 0.0 && p < 1.0 => dist.inverse_cdf(p),
        _ => f64::NAN,
    }
}
