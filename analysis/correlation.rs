use crate::data::Covariate;
use crate::features::DerivedDataset;
use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Absolute correlation at or above which a pair is reported as strong.
pub const STRONG_CORRELATION: f64 = 0.7;

/// Pairwise-complete Pearson correlations between covariates.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub covariates: Vec<Covariate>,
    /// Symmetric, unit diagonal, entries in [-1, 1] or `NaN`.
    pub values: Array2<f64>,
    /// Number of rows where both covariates of a pair are present.
    pub pair_counts: Array2<usize>,
}

/// A pair of covariates and their correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub first: Covariate,
    pub second: Covariate,
    pub r: f64,
    pub n: usize,
}

impl CorrelationMatrix {
    /// Off-diagonal pairs with `|r| >= threshold`, strongest first.
    pub fn strongest_pairs(&self, threshold: f64) -> Vec<CorrelatedPair> {
        let k = self.covariates.len();
        (0..k)
            .tuple_combinations()
            .filter_map(|(i, j)| {
                let r = self.values[[i, j]];
                (r.is_finite() && r.abs() >= threshold).then(|| CorrelatedPair {
                    first: self.covariates[i],
                    second: self.covariates[j],
                    r,
                    n: self.pair_counts[[i, j]],
                })
            })
            .sorted_by(|a, b| b.r.abs().total_cmp(&a.r.abs()))
            .collect()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.covariates.iter().map(|c| c.label()).collect()
    }
}

impl std::fmt::Display for CorrelationMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<24}", "")?;
        for c in &self.covariates {
            write!(f, " {:>8.8}", c.column())?;
        }
        writeln!(f)?;
        for (i, c) in self.covariates.iter().enumerate() {
            write!(f, "{:<24}", c.column())?;
            for j in 0..self.covariates.len() {
                write!(f, " {:>8.3}", self.values[[i, j]])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Pearson correlation over the rows where both values are present.
///
/// Returns `(r, n)`. `r` is `NaN` when fewer than two pairs remain or either
/// side has zero variance.
pub fn pearson_complete(a: &[Option<f64>], b: &[Option<f64>]) -> (f64, usize) {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return (f64::NAN, n);
    }
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let r = sxy / (sxx * syy).sqrt();
    (if r.is_finite() { r.clamp(-1.0, 1.0) } else { f64::NAN }, n)
}

/// Correlation matrix of `covariates` using pairwise-complete observations.
pub fn pairwise_pearson(data: &DerivedDataset, covariates: &[Covariate]) -> CorrelationMatrix {
    let columns: Vec<Vec<Option<f64>>> = covariates
        .iter()
        .map(|&c| {
            data.records
                .iter()
                .map(|r| r.observation.covariates.get(c))
                .collect()
        })
        .collect();

    let k = covariates.len();
    let mut values = Array2::<f64>::from_elem((k, k), f64::NAN);
    let mut pair_counts = Array2::<usize>::zeros((k, k));
    for i in 0..k {
        values[[i, i]] = 1.0;
        pair_counts[[i, i]] = columns[i].iter().flatten().count();
        for j in (i + 1)..k {
            let (r, n) = pearson_complete(&columns[i], &columns[j]);
            values[[i, j]] = r;
            values[[j, i]] = r;
            pair_counts[[i, j]] = n;
            pair_counts[[j, i]] = n;
        }
    }

    CorrelationMatrix {
        covariates: covariates.to_vec(),
        values,
        pair_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CovariateValues, Observation};
    use crate::features::DerivedRecord;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn dataset(rows: Vec<[Option<f64>; 3]>) -> DerivedDataset {
        let covs = [Covariate::PovertyRate, Covariate::IlliteracyRate, Covariate::UnemploymentRate];
        let records = rows
            .into_iter()
            .map(|vals| {
                let mut covariates = CovariateValues::default();
                for (c, v) in covs.iter().zip(vals) {
                    covariates.set(*c, v);
                }
                DerivedRecord {
                    observation: Observation {
                        microregion: "R".to_string(),
                        year: 2013,
                        tb_cases: 1,
                        population: 100,
                        longitude: None,
                        latitude: None,
                        covariates,
                    },
                    tb_rate: Some(0.01),
                    log_tb_rate: Some(0.011_f64.ln()),
                    year_label: "2013".to_string(),
                }
            })
            .collect();
        DerivedDataset {
            records,
            year_levels: vec!["2013".to_string()],
            ..DerivedDataset::default()
        }
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let mut rng = StdRng::seed_from_u64(5);
        let rows = (0..50)
            .map(|_| {
                let a: f64 = rng.gen_range(0.0..10.0);
                let missing = rng.gen_bool(0.2);
                [
                    Some(a),
                    if missing { None } else { Some(a * 0.5 + rng.gen_range(0.0..3.0)) },
                    Some(rng.gen_range(0.0..1.0)),
                ]
            })
            .collect();
        let data = dataset(rows);
        let covs = [Covariate::PovertyRate, Covariate::IlliteracyRate, Covariate::UnemploymentRate];
        let m = pairwise_pearson(&data, &covs);
        for i in 0..3 {
            assert_eq!(m.values[[i, i]], 1.0);
            for j in 0..3 {
                assert_eq!(m.values[[i, j]], m.values[[j, i]]);
                assert!((-1.0..=1.0).contains(&m.values[[i, j]]));
            }
        }
        assert!(m.pair_counts[[0, 1]] < 50);
        assert_eq!(m.pair_counts[[0, 2]], 50);
        assert!(m.values[[0, 1]] > 0.5);
    }

    #[test]
    fn test_pairwise_complete_uses_only_shared_rows() {
        let a = [Some(1.0), Some(2.0), Some(3.0), None, Some(100.0)];
        let b = [Some(2.0), Some(4.0), Some(6.0), Some(0.0), None];
        let (r, n) = pearson_complete(&a, &b);
        assert_eq!(n, 3);
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_pairs_are_nan() {
        let constant = [Some(1.0), Some(1.0), Some(1.0)];
        let varying = [Some(1.0), Some(2.0), Some(3.0)];
        assert!(pearson_complete(&constant, &varying).0.is_nan());
        assert!(pearson_complete(&[Some(1.0)], &[Some(2.0)]).0.is_nan());
    }

    #[test]
    fn test_strongest_pairs_threshold() {
        let rows = (0..10)
            .map(|i| {
                let x = i as f64;
                [Some(x), Some(-2.0 * x + 1.0), Some(((i * 7) % 5) as f64)]
            })
            .collect();
        let m = pairwise_pearson(
            &dataset(rows),
            &[Covariate::PovertyRate, Covariate::IlliteracyRate, Covariate::UnemploymentRate],
        );
        let strong = m.strongest_pairs(STRONG_CORRELATION);
        assert_eq!(strong[0].first, Covariate::PovertyRate);
        assert_eq!(strong[0].second, Covariate::IlliteracyRate);
        assert_abs_diff_eq!(strong[0].r, -1.0, epsilon = 1e-12);
    }
}
