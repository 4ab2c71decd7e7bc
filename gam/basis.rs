use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use ndarray_linalg::{Eigh, UPLO};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relative eigenvalue threshold below which a direction counts as unpenalized.
const NULL_SPACE_TOLERANCE: f64 = 1e-9;

/// Defines the strategy for placing the internal knots of a spline.
/// This is part of the public API and will be saved in the model configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnotStrategy {
    /// Place knots uniformly across the data range.
    Uniform,
    /// Place knots at the quantiles of the observed values.
    Quantile,
}

/// A comprehensive error type for all operations within the basis module.
#[derive(Error, Debug)]
pub enum BasisError {
    #[error("Spline degree must be at least 1, but was {0}.")]
    InvalidDegree(usize),

    #[error("Data range is invalid: start ({0}) must be less than or equal to end ({1}).")]
    InvalidRange(f64, f64),

    #[error("Quantile strategy requires a non-empty training data set for quantile calculation.")]
    QuantileDataMissing,

    #[error("Cannot compute {num_quantiles} quantiles from only {num_points} data points.")]
    InsufficientDataForQuantiles {
        num_quantiles: usize,
        num_points: usize,
    },

    #[error(
        "Penalty order ({order}) must be positive and less than the number of basis functions ({num_basis})."
    )]
    InvalidPenaltyOrder { order: usize, num_basis: usize },

    #[error("Thin-plate spline needs at least {required} distinct locations, found {found}.")]
    InsufficientThinPlateKnots { required: usize, found: usize },

    #[error("Thin-plate spline input must have exactly 2 columns, found {0}.")]
    InvalidThinPlateDimension(usize),

    #[error("Basis input contains non-finite values.")]
    NonFiniteInput,

    #[error("Eigendecomposition failed while building a basis: {0}")]
    LinalgError(#[from] ndarray_linalg::error::LinalgError),
}

/// A thin-plate regression spline basis over two coordinates.
#[derive(Debug, Clone)]
pub struct ThinPlateBasis {
    /// `[K Z | 1 x y]`, shape `[n, (k - 3) + 3]`.
    pub basis: Array2<f64>,
    /// Bending-energy penalty on the kernel columns; zero on the polynomial columns.
    pub penalty: Array2<f64>,
    /// Number of constrained kernel columns at the front of `basis`.
    pub num_kernel_basis: usize,
    /// Knot locations, shape `[k, 2]`.
    pub knots: Array2<f64>,
}

/// Creates a B-spline basis expansion matrix and its corresponding knot vector.
///
/// Evaluation uses the Cox-de Boor recurrence in the triangular form, one knot
/// span at a time.
///
/// # Arguments
///
/// * `data`: The values to expand (one covariate column).
/// * `training_data_for_quantiles`: When `Some`, internal knots are placed at the
///   quantiles of these values; otherwise they are spread uniformly over `data_range`.
/// * `data_range`: A tuple `(min, max)` defining the boundary knots.
/// * `num_internal_knots`: The number of knots to place *between* the boundaries.
/// * `degree`: The degree of the B-spline polynomials (e.g., 3 for cubic).
///
/// # Returns
///
/// 1.  The **basis matrix**, with shape `[data.len(), num_internal_knots + degree + 1]`.
/// 2.  The **full knot vector** used to generate the basis.
pub fn create_bspline_basis(
    data: ArrayView1<f64>,
    training_data_for_quantiles: Option<ArrayView1<f64>>,
    data_range: (f64, f64),
    num_internal_knots: usize,
    degree: usize,
) -> Result<(Array2<f64>, Array1<f64>), BasisError> {
    if degree < 1 {
        return Err(BasisError::InvalidDegree(degree));
    }
    if data_range.0 > data_range.1 {
        return Err(BasisError::InvalidRange(data_range.0, data_range.1));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(BasisError::NonFiniteInput);
    }

    let knot_vector = internal::generate_full_knot_vector(
        data_range,
        num_internal_knots,
        degree,
        training_data_for_quantiles,
    )?;

    // n = k - d - 1 basis functions for k knots of degree d.
    let num_basis_functions = knot_vector.len() - degree - 1;
    let mut basis_matrix = Array2::zeros((data.len(), num_basis_functions));

    for (i, &x) in data.iter().enumerate() {
        let basis_row = internal::evaluate_splines_at_point(x, degree, knot_vector.view());
        basis_matrix.row_mut(i).assign(&basis_row);
    }

    Ok((basis_matrix, knot_vector))
}

/// Creates a penalty matrix `S = D' D` penalizing the squared `order`-th
/// differences of adjacent spline coefficients (P-splines).
pub fn create_difference_penalty_matrix(
    num_basis_functions: usize,
    order: usize,
) -> Result<Array2<f64>, BasisError> {
    if order == 0 || order >= num_basis_functions {
        return Err(BasisError::InvalidPenaltyOrder {
            order,
            num_basis: num_basis_functions,
        });
    }

    let mut d = Array2::<f64>::eye(num_basis_functions);
    for _ in 0..order {
        d = &d.slice(s![1.., ..]) - &d.slice(s![..-1, ..]);
    }

    Ok(d.t().dot(&d))
}

/// Applies a sum-to-zero constraint to a basis matrix for model identifiability.
///
/// The constraint vector `c = B' 1` is reflected onto the first axis with a
/// Householder transform `H`; the remaining columns of `H` span the space
/// orthogonal to `c`, so every column of `B Z` sums to zero over the data.
///
/// # Returns
/// 1. The constrained basis matrix (one fewer column).
/// 2. The transformation matrix `Z` used to create it.
pub fn apply_sum_to_zero_constraint(
    basis_matrix: ArrayView2<f64>,
) -> Result<(Array2<f64>, Array2<f64>), BasisError> {
    let k = basis_matrix.ncols();
    let c = basis_matrix.sum_axis(Axis(0));
    let norm = c.dot(&c).sqrt();

    let householder = if norm == 0.0 {
        Array2::<f64>::eye(k)
    } else {
        let mut v = c.clone();
        v[0] += if c[0] >= 0.0 { norm } else { -norm };
        let vtv = v.dot(&v);
        let outer = v
            .view()
            .insert_axis(Axis(1))
            .dot(&v.view().insert_axis(Axis(0)));
        Array2::<f64>::eye(k) - &(outer * (2.0 / vtv))
    };

    let z_transform = householder.slice(s![.., 1..]).to_owned();
    let constrained_basis = basis_matrix.dot(&z_transform);
    Ok((constrained_basis, z_transform))
}

/// Deterministically selects thin-plate knots via farthest-point sampling over
/// the distinct rows of `data`.
///
/// The seed is the lexicographically smallest location, so the same data always
/// yields the same knots.
pub fn select_thin_plate_knots(
    data: ArrayView2<f64>,
    num_knots: usize,
) -> Result<Array2<f64>, BasisError> {
    if data.ncols() != 2 {
        return Err(BasisError::InvalidThinPlateDimension(data.ncols()));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(BasisError::NonFiniteInput);
    }

    let mut locations: Vec<[f64; 2]> = data.rows().into_iter().map(|r| [r[0], r[1]]).collect();
    locations.sort_by(|a, b| {
        a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1]))
    });
    locations.dedup();

    if locations.len() < 3 {
        return Err(BasisError::InsufficientThinPlateKnots {
            required: 3,
            found: locations.len(),
        });
    }
    let target = num_knots.clamp(3, locations.len());

    let dist2 = |a: &[f64; 2], b: &[f64; 2]| {
        let dx = a[0] - b[0];
        let dy = a[1] - b[1];
        dx * dx + dy * dy
    };

    let mut selected = vec![0usize];
    let mut chosen = vec![false; locations.len()];
    chosen[0] = true;
    let mut min_dist2: Vec<f64> = locations.iter().map(|p| dist2(p, &locations[0])).collect();

    while selected.len() < target {
        let next = (0..locations.len())
            .filter(|&i| !chosen[i])
            .max_by(|&a, &b| min_dist2[a].total_cmp(&min_dist2[b]).then(b.cmp(&a)));
        let Some(next) = next else { break };
        selected.push(next);
        chosen[next] = true;
        for i in 0..locations.len() {
            let d2 = dist2(&locations[i], &locations[next]);
            if d2 < min_dist2[i] {
                min_dist2[i] = d2;
            }
        }
    }

    let mut knots = Array2::<f64>::zeros((selected.len(), 2));
    for (row, &idx) in selected.iter().enumerate() {
        knots[[row, 0]] = locations[idx][0];
        knots[[row, 1]] = locations[idx][1];
    }
    Ok(knots)
}

/// Creates a thin-plate regression spline basis (m = 2, d = 2) from data and knots.
///
/// The kernel coefficients are restricted to the null space of the knot
/// polynomial block, which makes the bending energy a proper quadratic penalty.
pub fn create_thin_plate_basis(
    data: ArrayView2<f64>,
    knots: ArrayView2<f64>,
) -> Result<ThinPlateBasis, BasisError> {
    if data.ncols() != 2 {
        return Err(BasisError::InvalidThinPlateDimension(data.ncols()));
    }
    if knots.ncols() != 2 {
        return Err(BasisError::InvalidThinPlateDimension(knots.ncols()));
    }
    if data.iter().any(|v| !v.is_finite()) || knots.iter().any(|v| !v.is_finite()) {
        return Err(BasisError::NonFiniteInput);
    }
    let n = data.nrows();
    let k = knots.nrows();
    if k < 3 {
        return Err(BasisError::InsufficientThinPlateKnots {
            required: 3,
            found: k,
        });
    }

    let kernel_block = internal::thin_plate_kernel(data, knots);
    let omega = internal::thin_plate_kernel(knots, knots);

    let knot_poly = internal::linear_polynomial_block(knots);
    let z = internal::null_space_of_transpose(knot_poly.view())?;

    let kernel_constrained = kernel_block.dot(&z);
    let omega_constrained = {
        let raw = z.t().dot(&omega).dot(&z);
        (&raw + &raw.t()) * 0.5
    };

    let kernel_cols = kernel_constrained.ncols();
    let total_cols = kernel_cols + 3;
    let mut basis = Array2::<f64>::zeros((n, total_cols));
    basis
        .slice_mut(s![.., 0..kernel_cols])
        .assign(&kernel_constrained);
    basis
        .slice_mut(s![.., kernel_cols..])
        .assign(&internal::linear_polynomial_block(data));

    let mut penalty = Array2::<f64>::zeros((total_cols, total_cols));
    penalty
        .slice_mut(s![0..kernel_cols, 0..kernel_cols])
        .assign(&omega_constrained);

    Ok(ThinPlateBasis {
        basis,
        penalty,
        num_kernel_basis: kernel_cols,
        knots: knots.to_owned(),
    })
}

/// Rank of a symmetric positive semi-definite penalty matrix.
pub fn penalty_rank(penalty: &Array2<f64>) -> Result<usize, BasisError> {
    let (eigenvalues, _) = penalty.eigh(UPLO::Lower)?;
    let max_eig = eigenvalues.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    if max_eig == 0.0 {
        return Ok(0);
    }
    Ok(eigenvalues
        .iter()
        .filter(|&&v| v > NULL_SPACE_TOLERANCE * max_eig)
        .count())
}

/// Log pseudo-determinant of a symmetric positive semi-definite penalty matrix.
pub fn penalty_log_pseudo_det(penalty: &Array2<f64>) -> Result<f64, BasisError> {
    let (eigenvalues, _) = penalty.eigh(UPLO::Lower)?;
    let max_eig = eigenvalues.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    Ok(eigenvalues
        .iter()
        .filter(|&&v| max_eig > 0.0 && v > NULL_SPACE_TOLERANCE * max_eig)
        .map(|&v| v.ln())
        .sum())
}

/// Builds the projector onto the null space of `penalty`, so that a second
/// smoothing parameter can shrink the otherwise unpenalized part of a smooth.
/// Returns `None` when the penalty has full rank.
pub fn null_space_penalty(penalty: &Array2<f64>) -> Result<Option<Array2<f64>>, BasisError> {
    let (eigenvalues, eigenvectors) = penalty.eigh(UPLO::Lower)?;
    let max_eig = eigenvalues.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    let null_cols: Vec<usize> = eigenvalues
        .iter()
        .enumerate()
        .filter(|&(_, &v)| max_eig == 0.0 || v <= NULL_SPACE_TOLERANCE * max_eig)
        .map(|(i, _)| i)
        .collect();
    if null_cols.is_empty() {
        return Ok(None);
    }
    let u0 = eigenvectors.select(Axis(1), &null_cols);
    Ok(Some(u0.dot(&u0.t())))
}

/// Internal module for implementation details not exposed in the public API.
mod internal {
    use super::*;

    /// Generates the full knot vector, including repeated boundary knots.
    pub(super) fn generate_full_knot_vector(
        data_range: (f64, f64),
        num_internal_knots: usize,
        degree: usize,
        training_data_for_quantiles: Option<ArrayView1<f64>>,
    ) -> Result<Array1<f64>, BasisError> {
        let (min_val, max_val) = data_range;

        let internal_knots = if let Some(training_data) = training_data_for_quantiles {
            if training_data.is_empty() {
                return Err(BasisError::QuantileDataMissing);
            }
            if training_data.len() < num_internal_knots {
                return Err(BasisError::InsufficientDataForQuantiles {
                    num_quantiles: num_internal_knots,
                    num_points: training_data.len(),
                });
            }
            quantiles(training_data, num_internal_knots)
        } else if num_internal_knots == 0 {
            Array1::from_vec(vec![])
        } else {
            let h = (max_val - min_val) / (num_internal_knots as f64 + 1.0);
            Array::from_iter((1..=num_internal_knots).map(|i| min_val + i as f64 * h))
        };

        // B-splines require `degree + 1` repeated knots at each boundary.
        let mut knots = Vec::with_capacity(num_internal_knots + 2 * (degree + 1));
        knots.extend(std::iter::repeat_n(min_val, degree + 1));
        knots.extend(internal_knots.iter().copied());
        knots.extend(std::iter::repeat_n(max_val, degree + 1));
        Ok(Array1::from_vec(knots))
    }

    /// Calculates evenly spaced interior quantiles using linear interpolation (Type 7 in R).
    fn quantiles(data: ArrayView1<f64>, num_quantiles: usize) -> Array1<f64> {
        let mut sorted_data = data.to_vec();
        sorted_data.sort_unstable_by(f64::total_cmp);

        let n = sorted_data.len();
        let quantiles_vec = (1..=num_quantiles)
            .map(|k| {
                let p = k as f64 / (num_quantiles as f64 + 1.0);
                let float_idx = (n as f64 - 1.0) * p;
                let lower_idx = float_idx.floor() as usize;
                let upper_idx = float_idx.ceil() as usize;
                let fraction = float_idx - lower_idx as f64;
                sorted_data[lower_idx] * (1.0 - fraction) + sorted_data[upper_idx] * fraction
            })
            .collect();

        Array1::from_vec(quantiles_vec)
    }

    /// Evaluates all B-spline basis functions at a single point `x`.
    pub(super) fn evaluate_splines_at_point(
        x: f64,
        degree: usize,
        knots: ArrayView1<f64>,
    ) -> Array1<f64> {
        let num_knots = knots.len();
        let num_basis = num_knots - degree - 1;

        // Knot span `mu` with knots[mu] <= x < knots[mu + 1], clamped to the valid spans.
        let mu = knots
            .iter()
            .rposition(|&k| k <= x)
            .unwrap_or(degree)
            .clamp(degree, num_basis - 1);

        let mut n = vec![0.0; degree + 1];
        let mut left = vec![0.0; degree + 1];
        let mut right = vec![0.0; degree + 1];
        n[0] = 1.0;

        for j in 1..=degree {
            left[j] = x - knots[mu + 1 - j];
            right[j] = knots[mu + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                let denom = right[r + 1] + left[j - r];
                let temp = if denom.abs() > 1e-12 { n[r] / denom } else { 0.0 };
                n[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            n[j] = saved;
        }

        let mut basis_values = Array1::zeros(num_basis);
        let start_index = mu - degree;
        for (i, value) in n.into_iter().enumerate() {
            basis_values[start_index + i] = value;
        }
        basis_values
    }

    /// `[1, x, y]` for each row of a two-column matrix.
    pub(super) fn linear_polynomial_block(points: ArrayView2<f64>) -> Array2<f64> {
        let mut block = Array2::<f64>::ones((points.nrows(), 3));
        block.column_mut(1).assign(&points.column(0));
        block.column_mut(2).assign(&points.column(1));
        block
    }

    /// Evaluates the m = 2, d = 2 thin-plate kernel `r^2 log r` between two point sets.
    pub(super) fn thin_plate_kernel(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Array2<f64> {
        let mut kernel = Array2::<f64>::zeros((a.nrows(), b.nrows()));
        for i in 0..a.nrows() {
            for j in 0..b.nrows() {
                let dx = a[[i, 0]] - b[[j, 0]];
                let dy = a[[i, 1]] - b[[j, 1]];
                let r2 = dx * dx + dy * dy;
                kernel[[i, j]] = if r2 > 0.0 { 0.5 * r2 * r2.ln() } else { 0.0 };
            }
        }
        kernel
    }

    /// Orthonormal basis for `{alpha : P' alpha = 0}` with `P` of shape `[k, q]`.
    pub(super) fn null_space_of_transpose(p: ArrayView2<f64>) -> Result<Array2<f64>, BasisError> {
        let gram = p.dot(&p.t());
        let (eigenvalues, eigenvectors) = gram.eigh(UPLO::Lower)?;
        let max_eig = eigenvalues.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        let rank = eigenvalues
            .iter()
            .filter(|&&v| v > NULL_SPACE_TOLERANCE * max_eig)
            .count();
        // Eigenvalues come back in ascending order, so the null space is the leading block.
        let null_dim = p.nrows() - rank;
        Ok(eigenvectors.slice(s![.., 0..null_dim]).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn assert_matrix_close(actual: &Array2<f64>, expected: &Array2<f64>, epsilon: f64) {
        assert_eq!(actual.shape(), expected.shape());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *e, epsilon = epsilon);
        }
    }

    #[test]
    fn test_knot_generation_uniform() {
        let knots = internal::generate_full_knot_vector((0.0, 10.0), 3, 2, None).unwrap();
        // 3 internal + 2 * (2+1) boundary = 9 knots
        assert_eq!(knots.len(), 9);
        assert_eq!(knots, array![0.0, 0.0, 0.0, 2.5, 5.0, 7.5, 10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_knot_generation_quantile() {
        let training_data = array![0., 1., 2., 5., 8., 9., 10.];
        let knots =
            internal::generate_full_knot_vector((0.0, 10.0), 3, 2, Some(training_data.view()))
                .unwrap();
        // p=0.25 -> idx=1.5 -> 1.5; p=0.5 -> idx=3 -> 5; p=0.75 -> idx=4.5 -> 8.5
        assert_eq!(knots, array![0.0, 0.0, 0.0, 1.5, 5.0, 8.5, 10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_penalty_matrix_creation() {
        let s = create_difference_penalty_matrix(5, 2).unwrap();
        let expected_s = array![
            [1., -2., 1., 0., 0.],
            [-2., 5., -4., 1., 0.],
            [1., -4., 6., -4., 1.],
            [0., 1., -4., 5., -2.],
            [0., 0., 1., -2., 1.]
        ];
        assert_matrix_close(&s, &expected_s, 1e-9);
    }

    #[test]
    fn test_bspline_basis_sums_to_one() {
        let data = Array::linspace(0.0, 10.0, 101);
        let (basis, _) = create_bspline_basis(data.view(), None, (0.0, 10.0), 10, 3).unwrap();
        for &sum in basis.sum_axis(Axis(1)).iter() {
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_single_point_evaluation_degree_one() {
        // Linear splines on knots [0,0,1,2,2]: at x = 0.5 the hat functions give [0.5, 0.5, 0].
        let knots = array![0.0, 0.0, 1.0, 2.0, 2.0];
        let values = internal::evaluate_splines_at_point(0.5, 1, knots.view());
        assert_eq!(values.len(), 3);
        assert_abs_diff_eq!(values[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(values[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(values[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sum_to_zero_constraint_columns_sum_to_zero() {
        let data = Array::linspace(0.0, 1.0, 40);
        let (basis, _) = create_bspline_basis(data.view(), None, (0.0, 1.0), 4, 3).unwrap();
        let (constrained, z) = apply_sum_to_zero_constraint(basis.view()).unwrap();
        assert_eq!(constrained.ncols(), basis.ncols() - 1);
        assert_eq!(z.shape(), &[basis.ncols(), basis.ncols() - 1]);
        for &col_sum in constrained.sum_axis(Axis(0)).iter() {
            assert_abs_diff_eq!(col_sum, 0.0, epsilon = 1e-9);
        }
        // Z has orthonormal columns.
        assert_matrix_close(&z.t().dot(&z), &Array2::eye(z.ncols()), 1e-10);
    }

    #[test]
    fn test_thin_plate_knots_are_deterministic_and_distinct() {
        let data = array![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [0.5, 0.5],
            [0.0, 0.0],
            [1.0, 1.0]
        ];
        let k1 = select_thin_plate_knots(data.view(), 4).unwrap();
        let k2 = select_thin_plate_knots(data.view(), 4).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.nrows(), 4);
        for i in 0..k1.nrows() {
            for j in (i + 1)..k1.nrows() {
                assert!(k1.row(i) != k1.row(j), "duplicate knot selected");
            }
        }
        // Requesting more knots than distinct locations is capped.
        assert_eq!(select_thin_plate_knots(data.view(), 50).unwrap().nrows(), 5);
    }

    #[test]
    fn test_thin_plate_basis_shapes_and_penalty() {
        let data = array![
            [0.0, 0.0],
            [2.0, 0.5],
            [0.3, 1.7],
            [1.1, 1.2],
            [1.9, 2.2],
            [0.7, 0.4]
        ];
        let knots = select_thin_plate_knots(data.view(), 5).unwrap();
        let tps = create_thin_plate_basis(data.view(), knots.view()).unwrap();
        assert_eq!(tps.num_kernel_basis, 2);
        assert_eq!(tps.basis.shape(), &[6, 5]);
        assert_eq!(tps.penalty.shape(), &[5, 5]);
        assert!(tps.basis.iter().all(|v| v.is_finite()));
        // Polynomial columns carry no penalty.
        assert_abs_diff_eq!(tps.penalty.slice(s![2.., ..]).sum(), 0.0, epsilon = 1e-12);
        assert_eq!(penalty_rank(&tps.penalty).unwrap(), 2);
    }

    #[test]
    fn test_null_space_penalty_complements_difference_penalty() {
        let s = create_difference_penalty_matrix(6, 2).unwrap();
        let s0 = null_space_penalty(&s).unwrap().expect("second-order penalty has a null space");
        assert_eq!(penalty_rank(&s).unwrap(), 4);
        assert_eq!(penalty_rank(&s0).unwrap(), 2);
        // The two penalties act on orthogonal subspaces.
        assert!(s.dot(&s0).iter().all(|v| v.abs() < 1e-8));
    }

    #[test]
    fn test_error_conditions() {
        match create_bspline_basis(Array1::<f64>::zeros(0).view(), None, (0.0, 10.0), 5, 0).unwrap_err() {
            BasisError::InvalidDegree(deg) => assert_eq!(deg, 0),
            other => panic!("Expected InvalidDegree error, got {other:?}"),
        }
        match create_bspline_basis(Array1::<f64>::zeros(0).view(), None, (10.0, 0.0), 5, 1).unwrap_err() {
            BasisError::InvalidRange(start, end) => {
                assert_eq!(start, 10.0);
                assert_eq!(end, 0.0);
            }
            other => panic!("Expected InvalidRange error, got {other:?}"),
        }
        match create_difference_penalty_matrix(5, 5).unwrap_err() {
            BasisError::InvalidPenaltyOrder { order, num_basis } => {
                assert_eq!(order, 5);
                assert_eq!(num_basis, 5);
            }
            other => panic!("Expected InvalidPenaltyOrder error, got {other:?}"),
        }
        let collinear = array![[0.0, 0.0], [0.0, 0.0]];
        assert!(matches!(
            select_thin_plate_knots(collinear.view(), 3),
            Err(BasisError::InsufficientThinPlateKnots { .. })
        ));
    }
}
