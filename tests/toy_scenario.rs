use approx::assert_abs_diff_eq;
use std::fmt::Write as _;
use std::path::Path;
use tbgam::data::{Covariate, load_dataset};
use tbgam::features::derive_features;
use tbgam::gam::estimate::EstimationError;
use tbgam::models::{ModelError, ModelKind, ModelingConfig, fit_model};
use tbgam::temporal::summarize_by_year;

/// Four regions observed in 2013 and 2014. Region R1 in 2013 has 10 cases in
/// 1000 people; the others vary so the response is not constant.
fn write_toy_csv(path: &Path) {
    let mut text = String::from("microregion,year,tb_cases,population,longitude,latitude");
    for c in Covariate::ALL {
        text.push(',');
        text.push_str(c.column());
    }
    text.push('\n');

    let cases = [[10, 12], [7, 9], [15, 11], [5, 8]];
    for (year_idx, year) in [2013, 2014].into_iter().enumerate() {
        for region in 0..4 {
            let _ = write!(
                text,
                "R{},{year},{},1000,{},{}",
                region + 1,
                cases[region][year_idx],
                -60.0 + 5.0 * region as f64,
                -15.0 + (region % 2) as f64,
            );
            for k in 0..Covariate::ALL.len() {
                let value = ((region * 3 + year_idx * 2 + k) % 7) as f64 + 0.5 * k as f64;
                let _ = write!(text, ",{value}");
            }
            text.push('\n');
        }
    }
    std::fs::write(path, text).unwrap();
}

#[test]
fn toy_rates_and_covariate_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toy.csv");
    write_toy_csv(&path);

    let dataset = load_dataset(&path).unwrap();
    assert_eq!(dataset.len(), 8);
    let data = derive_features(dataset);
    assert_eq!(data.year_levels, vec!["2013", "2014"]);

    let first = data
        .records
        .iter()
        .find(|r| r.observation.microregion == "R1" && r.observation.year == 2013)
        .unwrap();
    assert_abs_diff_eq!(first.tb_rate.unwrap(), 0.01, epsilon = 1e-12);
    assert_abs_diff_eq!(first.log_tb_rate.unwrap(), -4.5098, epsilon = 1e-4);
    assert_eq!(first.year_label, "2013");

    let years = summarize_by_year(&data);
    assert_eq!(years.len(), 2);
    assert!(years.iter().all(|y| y.n_regions == 4));

    // Intercept, one year contrast and the linear part of eight smooths leave
    // ten unpenalized coefficients for eight rows.
    match fit_model(&data, ModelKind::Covariates, &ModelingConfig::default()) {
        Err(ModelError::Estimation {
            model: ModelKind::Covariates,
            source: EstimationError::InsufficientData { rows, unpenalized },
        }) => {
            assert_eq!(rows, 8);
            assert_eq!(unpenalized, 10);
        }
        other => panic!("expected InsufficientData, got {:?}", other.map(|m| m.aic())),
    }

    // The null-space penalty shrinks those directions too, which makes the
    // covariate model estimable.
    let config = ModelingConfig {
        null_space_penalty: true,
        ..ModelingConfig::default()
    };
    let model = fit_model(&data, ModelKind::Covariates, &config).unwrap();
    assert_eq!(model.row_indices.len(), 8);
    assert!(model.aic().is_finite());
    assert!(model.fit.total_edf > 0.0);
}
