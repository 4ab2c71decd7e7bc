use crate::gam::basis::{self, KnotStrategy, create_bspline_basis, create_difference_penalty_matrix};
use crate::gam::estimate::EstimationError;
use crate::gam::model::BasisConfig;
use ndarray::{Array1, Array2, ArrayView2, Axis, s};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

/// A categorical predictor coded against its first level.
#[derive(Debug, Clone)]
pub struct Factor {
    pub name: String,
    pub levels: Vec<String>,
    /// Level index of every row.
    pub codes: Vec<usize>,
}

/// The complete-case data a single model is fitted on.
#[derive(Debug, Clone)]
pub struct ModelFrame {
    pub response: Array1<f64>,
    pub numeric: BTreeMap<String, Array1<f64>>,
    pub factor: Option<Factor>,
}

impl ModelFrame {
    pub fn n_rows(&self) -> usize {
        self.response.len()
    }

    fn column(&self, name: &str) -> Result<&Array1<f64>, EstimationError> {
        self.numeric
            .get(name)
            .ok_or_else(|| EstimationError::LayoutError(format!("model frame has no column '{name}'")))
    }

    fn factor(&self) -> Result<&Factor, EstimationError> {
        self.factor.as_ref().ok_or_else(|| {
            EstimationError::LayoutError("formula needs a factor but the model frame has none".to_string())
        })
    }
}

/// One smooth term of an additive formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SmoothSpec {
    /// `s(x)`: centred penalized regression spline of one variable.
    PSpline { variable: String, basis: BasisConfig },
    /// `s(x, y)`: centred isotropic thin-plate regression spline.
    ThinPlate { x: String, y: String, num_knots: usize },
    /// `s(x, y, by = factor)`: one thin-plate surface per factor level.
    ThinPlateByFactor { x: String, y: String, num_knots: usize },
}

impl SmoothSpec {
    pub fn label(&self) -> String {
        match self {
            SmoothSpec::PSpline { variable, .. } => format!("s({variable})"),
            SmoothSpec::ThinPlate { x, y, .. } => format!("s({x},{y})"),
            SmoothSpec::ThinPlateByFactor { x, y, .. } => format!("s({x},{y}):by"),
        }
    }
}

/// An additive model formula: intercept, optional factor main effect and smooths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamFormula {
    pub response: String,
    pub factor_main_effect: bool,
    pub smooths: Vec<SmoothSpec>,
}

impl std::fmt::Display for GamFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut terms: Vec<String> = self.smooths.iter().map(SmoothSpec::label).collect();
        if self.factor_main_effect {
            terms.push("factor".to_string());
        }
        if terms.is_empty() {
            terms.push("1".to_string());
        }
        write!(f, "{} ~ {}", self.response, terms.join(" + "))
    }
}

/// Unpenalized coefficient with its column in `X`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametricTerm {
    pub label: String,
    pub col: usize,
}

/// A smooth block of columns and the penalties acting on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothTermLayout {
    pub label: String,
    pub col_range: Range<usize>,
    pub penalty_indices: Vec<usize>,
}

/// Holds the layout of the design matrix `X`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelLayout {
    pub parametric: Vec<ParametricTerm>,
    pub smooths: Vec<SmoothTermLayout>,
    pub total_coeffs: usize,
}

/// One penalty matrix `S_k`, embedded at `col_range` of the full coefficient vector.
#[derive(Debug, Clone)]
pub struct PenaltyBlock {
    pub col_range: Range<usize>,
    pub matrix: Array2<f64>,
    pub rank: usize,
    pub log_pseudo_det: f64,
}

/// Design matrix, penalties and layout of one model.
#[derive(Debug, Clone)]
pub struct DesignMatrices {
    pub x: Array2<f64>,
    pub penalties: Vec<PenaltyBlock>,
    pub layout: ModelLayout,
}

impl DesignMatrices {
    /// Dimension of the unpenalized coefficient space.
    pub fn null_space_dim(&self) -> usize {
        let penalized: usize = self.penalties.iter().map(|p| p.rank).sum();
        self.layout.total_coeffs.saturating_sub(penalized)
    }
}

/// A block of design columns produced for one smooth, before placement in `X`.
struct SmoothBlock {
    label: String,
    columns: Array2<f64>,
    penalties: Vec<Array2<f64>>,
}

/// Constructs the design matrix `X` and the list of penalty blocks for `formula`.
///
/// The column order is: intercept, factor contrasts (if requested), then each
/// smooth in formula order. `ThinPlateByFactor` expands to one block per level.
pub fn build_design(
    frame: &ModelFrame,
    formula: &GamFormula,
    null_space_penalty: bool,
) -> Result<DesignMatrices, EstimationError> {
    let n = frame.n_rows();
    if n == 0 {
        return Err(EstimationError::InsufficientData {
            rows: 0,
            unpenalized: 1,
        });
    }

    let mut parametric_columns: Vec<(String, Array1<f64>)> =
        vec![("(Intercept)".to_string(), Array1::ones(n))];
    if formula.factor_main_effect {
        let factor = frame.factor()?;
        for (level_idx, level) in factor.levels.iter().enumerate().skip(1) {
            let indicator = Array1::from_iter(
                factor
                    .codes
                    .iter()
                    .map(|&c| if c == level_idx { 1.0 } else { 0.0 }),
            );
            parametric_columns.push((format!("{}{}", factor.name, level), indicator));
        }
    }

    let mut blocks: Vec<SmoothBlock> = Vec::new();
    for spec in &formula.smooths {
        match spec {
            SmoothSpec::PSpline { variable, basis } => {
                blocks.push(pspline_block(variable, frame.column(variable)?, basis)?);
            }
            SmoothSpec::ThinPlate { x, y, num_knots } => {
                let coords = stack_coordinates(frame.column(x)?, frame.column(y)?);
                blocks.push(thin_plate_block(x, y, coords.view(), *num_knots)?);
            }
            SmoothSpec::ThinPlateByFactor { x, y, num_knots } => {
                let coords = stack_coordinates(frame.column(x)?, frame.column(y)?);
                blocks.extend(thin_plate_by_factor_blocks(
                    x,
                    y,
                    coords.view(),
                    *num_knots,
                    frame.factor()?,
                )?);
            }
        }
    }

    // --- Assemble X following the canonical order ---
    let total_coeffs =
        parametric_columns.len() + blocks.iter().map(|b| b.columns.ncols()).sum::<usize>();
    let mut x = Array2::<f64>::zeros((n, total_coeffs));
    let mut parametric = Vec::with_capacity(parametric_columns.len());
    for (col, (label, values)) in parametric_columns.into_iter().enumerate() {
        x.column_mut(col).assign(&values);
        parametric.push(ParametricTerm { label, col });
    }

    let mut current_col = parametric.len();
    let mut smooths = Vec::with_capacity(blocks.len());
    let mut penalties = Vec::new();
    for block in blocks {
        let col_range = current_col..current_col + block.columns.ncols();
        x.slice_mut(s![.., col_range.clone()]).assign(&block.columns);

        // Rescale each penalty to the size of its block's cross-product so that
        // log-smoothing parameters near zero are a sensible starting point.
        let xtx_norm = frobenius_norm(&block.columns.t().dot(&block.columns));
        let mut penalty_indices = Vec::new();
        let mut all_penalties = block.penalties;
        if null_space_penalty {
            if let Some(first) = all_penalties.first() {
                if let Some(null_penalty) = basis::null_space_penalty(first)? {
                    all_penalties.push(null_penalty);
                }
            }
        }
        for matrix in all_penalties {
            let s_norm = frobenius_norm(&matrix);
            let matrix = if s_norm > 0.0 && xtx_norm > 0.0 {
                matrix * (xtx_norm / s_norm)
            } else {
                matrix
            };
            let rank = basis::penalty_rank(&matrix)?;
            let log_pseudo_det = basis::penalty_log_pseudo_det(&matrix)?;
            penalty_indices.push(penalties.len());
            penalties.push(PenaltyBlock {
                col_range: col_range.clone(),
                matrix,
                rank,
                log_pseudo_det,
            });
        }

        current_col = col_range.end;
        smooths.push(SmoothTermLayout {
            label: block.label,
            col_range,
            penalty_indices,
        });
    }

    if current_col != total_coeffs {
        return Err(EstimationError::LayoutError(format!(
            "design assembly placed {current_col} columns but expected {total_coeffs}"
        )));
    }

    log::debug!(
        "Built design for '{}': {} rows, {} coefficients, {} penalties.",
        formula,
        n,
        total_coeffs,
        penalties.len()
    );

    Ok(DesignMatrices {
        x,
        penalties,
        layout: ModelLayout {
            parametric,
            smooths,
            total_coeffs,
        },
    })
}

fn frobenius_norm(m: &Array2<f64>) -> f64 {
    m.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn stack_coordinates(x: &Array1<f64>, y: &Array1<f64>) -> Array2<f64> {
    ndarray::stack(Axis(1), &[x.view(), y.view()])
        .unwrap_or_else(|_| Array2::zeros((0, 2)))
}

/// Centred P-spline block for one covariate.
fn pspline_block(
    variable: &str,
    values: &Array1<f64>,
    config: &BasisConfig,
) -> Result<SmoothBlock, EstimationError> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > min) {
        return Err(EstimationError::DegenerateCovariate(variable.to_string()));
    }

    let quantile_source = match config.knot_strategy {
        KnotStrategy::Quantile => Some(values.view()),
        KnotStrategy::Uniform => None,
    };
    let (basis_unc, _knots) = create_bspline_basis(
        values.view(),
        quantile_source,
        (min, max),
        config.num_knots,
        config.degree,
    )?;
    let (constrained, z) = basis::apply_sum_to_zero_constraint(basis_unc.view())?;
    let s_unc = create_difference_penalty_matrix(basis_unc.ncols(), config.penalty_order)?;
    let s_con = z.t().dot(&s_unc).dot(&z);

    Ok(SmoothBlock {
        label: format!("s({variable})"),
        columns: constrained,
        penalties: vec![symmetrize(s_con)],
    })
}

/// Centred thin-plate block for a pair of coordinates.
fn thin_plate_block(
    x: &str,
    y: &str,
    coords: ArrayView2<f64>,
    num_knots: usize,
) -> Result<SmoothBlock, EstimationError> {
    let knots = basis::select_thin_plate_knots(coords, num_knots)?;
    let tps = basis::create_thin_plate_basis(coords, knots.view())?;
    let (constrained, z) = basis::apply_sum_to_zero_constraint(tps.basis.view())?;
    let penalty = z.t().dot(&tps.penalty).dot(&z);

    Ok(SmoothBlock {
        label: format!("s({x},{y})"),
        columns: constrained,
        penalties: vec![symmetrize(penalty)],
    })
}

/// One uncentred thin-plate block per factor level, each zero outside its level.
///
/// Every level gets the penalized kernel columns. Only non-reference levels get
/// the linear columns, which keeps the unpenalized space identifiable next to
/// the intercept, the factor contrasts and a main spatial smooth.
fn thin_plate_by_factor_blocks(
    x: &str,
    y: &str,
    coords: ArrayView2<f64>,
    num_knots: usize,
    factor: &Factor,
) -> Result<Vec<SmoothBlock>, EstimationError> {
    let knots = basis::select_thin_plate_knots(coords, num_knots)?;
    let tps = basis::create_thin_plate_basis(coords, knots.view())?;
    let kc = tps.num_kernel_basis;

    let mut blocks = Vec::with_capacity(factor.levels.len());
    for (level_idx, level) in factor.levels.iter().enumerate() {
        let is_reference = level_idx == 0;
        let ncols = if is_reference { kc } else { kc + 2 };
        let mut columns = Array2::<f64>::zeros((coords.nrows(), ncols));
        for (row, &code) in factor.codes.iter().enumerate() {
            if code != level_idx {
                continue;
            }
            columns
                .slice_mut(s![row, 0..kc])
                .assign(&tps.basis.slice(s![row, 0..kc]));
            if !is_reference {
                // Basis columns kc+1, kc+2 hold x and y (kc is the constant).
                columns[[row, kc]] = tps.basis[[row, kc + 1]];
                columns[[row, kc + 1]] = tps.basis[[row, kc + 2]];
            }
        }

        let mut penalty = Array2::<f64>::zeros((ncols, ncols));
        penalty
            .slice_mut(s![0..kc, 0..kc])
            .assign(&tps.penalty.slice(s![0..kc, 0..kc]));

        blocks.push(SmoothBlock {
            label: format!("s({x},{y}):{}{}", factor.name, level),
            columns,
            penalties: vec![symmetrize(penalty)],
        });
    }
    Ok(blocks)
}

fn symmetrize(m: Array2<f64>) -> Array2<f64> {
    (&m + &m.t()) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn frame_with_factor(n: usize) -> ModelFrame {
        let mut numeric = BTreeMap::new();
        let u = Array1::from_iter((0..n).map(|i| i as f64 / n as f64));
        let lon = Array1::from_iter((0..n).map(|i| ((i * 7) % 11) as f64));
        let lat = Array1::from_iter((0..n).map(|i| ((i * 5) % 13) as f64));
        numeric.insert("u".to_string(), u.clone());
        numeric.insert("lon".to_string(), lon);
        numeric.insert("lat".to_string(), lat);
        ModelFrame {
            response: u.mapv(|v| (6.0 * v).sin()),
            numeric,
            factor: Some(Factor {
                name: "year".to_string(),
                levels: vec!["2013".to_string(), "2014".to_string()],
                codes: (0..n).map(|i| i % 2).collect(),
            }),
        }
    }

    fn pspline(variable: &str) -> SmoothSpec {
        SmoothSpec::PSpline {
            variable: variable.to_string(),
            basis: BasisConfig::default(),
        }
    }

    #[test]
    fn test_layout_orders_parametric_then_smooths() {
        let frame = frame_with_factor(40);
        let formula = GamFormula {
            response: "y".to_string(),
            factor_main_effect: true,
            smooths: vec![pspline("u")],
        };
        let design = build_design(&frame, &formula, false).unwrap();
        let layout = &design.layout;
        assert_eq!(layout.parametric.len(), 2);
        assert_eq!(layout.parametric[0].label, "(Intercept)");
        assert_eq!(layout.parametric[1].label, "year2014");
        // 6 interior knots + cubic = 10 basis functions, minus one for centring.
        assert_eq!(layout.smooths[0].col_range, 2..11);
        assert_eq!(layout.total_coeffs, 11);
        assert_eq!(design.x.shape(), &[40, 11]);
        assert_eq!(design.penalties.len(), 1);
        // A centred second-order P-spline leaves only the linear direction unpenalized.
        assert_eq!(design.penalties[0].rank, 8);
        assert_eq!(design.null_space_dim(), 3);
        for &col_sum in design.x.slice(s![.., 2..]).sum_axis(Axis(0)).iter() {
            assert_abs_diff_eq!(col_sum, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_null_space_penalty_adds_second_penalty() {
        let frame = frame_with_factor(40);
        let formula = GamFormula {
            response: "y".to_string(),
            factor_main_effect: false,
            smooths: vec![pspline("u")],
        };
        let design = build_design(&frame, &formula, true).unwrap();
        assert_eq!(design.penalties.len(), 2);
        assert_eq!(design.layout.smooths[0].penalty_indices, vec![0, 1]);
        assert_eq!(design.penalties[1].rank, 1);
        // Only the intercept remains unpenalized.
        assert_eq!(design.null_space_dim(), 1);
    }

    #[test]
    fn test_thin_plate_by_factor_blocks_are_zero_outside_level() {
        let frame = frame_with_factor(30);
        let formula = GamFormula {
            response: "y".to_string(),
            factor_main_effect: true,
            smooths: vec![
                SmoothSpec::ThinPlate {
                    x: "lon".to_string(),
                    y: "lat".to_string(),
                    num_knots: 8,
                },
                SmoothSpec::ThinPlateByFactor {
                    x: "lon".to_string(),
                    y: "lat".to_string(),
                    num_knots: 8,
                },
            ],
        };
        let design = build_design(&frame, &formula, false).unwrap();
        let smooths = &design.layout.smooths;
        assert_eq!(smooths.len(), 3);
        assert_eq!(smooths[1].label, "s(lon,lat):year2013");
        assert_eq!(smooths[2].label, "s(lon,lat):year2014");
        // Reference level has kernel columns only; the other level adds x and y.
        assert_eq!(smooths[2].col_range.len(), smooths[1].col_range.len() + 2);

        let codes = &frame.factor.as_ref().unwrap().codes;
        for (row, &code) in codes.iter().enumerate() {
            let reference_block = design.x.slice(s![row, smooths[1].col_range.clone()]);
            let other_block = design.x.slice(s![row, smooths[2].col_range.clone()]);
            if code == 0 {
                assert!(other_block.iter().all(|&v| v == 0.0));
            } else {
                assert!(reference_block.iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn test_constant_covariate_is_rejected() {
        let mut frame = frame_with_factor(20);
        frame
            .numeric
            .insert("flat".to_string(), Array1::from_elem(20, 3.0));
        let formula = GamFormula {
            response: "y".to_string(),
            factor_main_effect: false,
            smooths: vec![pspline("flat")],
        };
        match build_design(&frame, &formula, false) {
            Err(EstimationError::DegenerateCovariate(name)) => assert_eq!(name, "flat"),
            other => panic!("expected DegenerateCovariate, got {other:?}"),
        }
    }
}
