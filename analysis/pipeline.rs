//! # Analysis Pipeline
//!
//! Runs the stages in a fixed order. Every stage takes the previous stage's
//! value by reference and returns a new value; nothing is mutated in place.
//!
//! load → derive → explore → correlate → fit → select → risk → temporal → persist

use crate::config::{AnalysisConfig, ConfigError};
use crate::correlation::{self, CorrelationMatrix, STRONG_CORRELATION};
use crate::data::{self, Covariate, DataError};
use crate::explore::{self, ExploratoryReport};
use crate::features::{self, DerivedDataset};
use crate::models::{self, FittedModel, ModelError};
use crate::persist::{
    self, AnalysisArtifact, ComparisonRecord, CorrelationRecord, ModelRecord, PersistError,
};
use crate::plots::{self, MapPoint, PlotError};
use crate::progress::{PipelineStage, StageObserver};
use crate::risk::{self, RiskAssessment};
use crate::selection::{self, ModelComparison, SelectionError};
use crate::temporal::{self, YearSummary};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const HISTOGRAM_BINS: usize = 30;
const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Plot(#[from] PlotError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("Could not create output directory '{path}': {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a completed run produced and where it was written.
#[derive(Debug)]
pub struct PipelineReport {
    pub artifact: AnalysisArtifact,
    pub results_path: PathBuf,
    pub observations_path: PathBuf,
    pub plot_paths: Vec<PathBuf>,
}

/// Writes the SVG charts of a run into `<output>/plots`.
struct PlotSink {
    dir: Option<PathBuf>,
    written: Vec<PathBuf>,
}

impl PlotSink {
    fn new(output_dir: &Path, enabled: bool) -> Result<Self, PipelineError> {
        let dir = if enabled {
            let dir = output_dir.join("plots");
            fs::create_dir_all(&dir).map_err(|source| PipelineError::OutputDirectory {
                path: dir.clone(),
                source,
            })?;
            Some(dir)
        } else {
            None
        };
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    /// Renders lazily so that disabled plotting costs nothing. A chart with no
    /// data is skipped with a warning.
    fn emit(
        &mut self,
        file_name: &str,
        render: impl FnOnce() -> Result<String, PlotError>,
    ) -> Result<(), PipelineError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        match render() {
            Ok(svg) => {
                let path = dir.join(file_name);
                plots::write_svg(&path, &svg)?;
                log::debug!("Wrote {}", path.display());
                self.written.push(path);
                Ok(())
            }
            Err(PlotError::NoData(title)) => {
                log::warn!("Skipping plot '{title}': no data to draw.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn stage<T>(
    observer: &mut dyn StageObserver,
    stage: PipelineStage,
    body: impl FnOnce() -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    observer.on_stage_start(stage);
    log::info!("Stage: {stage}");
    let value = body()?;
    observer.on_stage_finish(stage);
    Ok(value)
}

/// Runs the full analysis described by `config`.
pub fn run(
    config: &AnalysisConfig,
    observer: &mut dyn StageObserver,
) -> Result<PipelineReport, PipelineError> {
    config.validate()?;
    fs::create_dir_all(&config.output_dir).map_err(|source| PipelineError::OutputDirectory {
        path: config.output_dir.clone(),
        source,
    })?;
    let mut sink = PlotSink::new(&config.output_dir, config.plots)?;

    let dataset = stage(observer, PipelineStage::Load, || {
        Ok(data::load_dataset(&config.input)?)
    })?;
    let derived = stage(observer, PipelineStage::Derive, || {
        Ok(features::derive_features(dataset))
    })?;
    let exploratory = stage(observer, PipelineStage::Explore, || {
        explore_stage(&derived, config, &mut sink)
    })?;
    let correlation = stage(observer, PipelineStage::Correlate, || {
        correlate_stage(&derived, &mut sink)
    })?;
    let fitted = stage(observer, PipelineStage::Fit, || fit_stage(&derived, config))?;
    let comparison = stage(observer, PipelineStage::Select, || {
        let comparison = selection::compare_models(&fitted)?;
        println!("\nModel comparison:\n{comparison}");
        Ok(comparison)
    })?;
    let risk = stage(observer, PipelineStage::Risk, || {
        risk_stage(&derived, &comparison, config, &mut sink)
    })?;
    let temporal = stage(observer, PipelineStage::Temporal, || {
        temporal_stage(&derived, &mut sink)
    })?;

    stage(observer, PipelineStage::Persist, || {
        let artifact = AnalysisArtifact {
            config: config.clone(),
            exploratory,
            correlation: CorrelationRecord::from(&correlation),
            models: fitted.iter().map(ModelRecord::from_fitted).collect(),
            comparison: ComparisonRecord::from(&comparison),
            risk: risk.summary(),
            temporal,
            observations: persist::augment(&derived, &risk),
        };
        let results_path = config.output_dir.join(persist::RESULTS_FILE);
        let observations_path = config.output_dir.join(persist::OBSERVATIONS_FILE);
        artifact.save(&results_path)?;
        persist::write_observations_csv(&observations_path, &artifact.observations)?;
        println!(
            "\nResults written to '{}' and '{}'.",
            results_path.display(),
            observations_path.display()
        );
        Ok(PipelineReport {
            artifact,
            results_path,
            observations_path,
            plot_paths: std::mem::take(&mut sink.written),
        })
    })
}

fn rate_map_points(data: &DerivedDataset, year: &str) -> Vec<MapPoint> {
    data.records
        .iter()
        .filter(|r| r.year_label == year)
        .filter_map(|r| {
            let (longitude, latitude) = r.observation.location()?;
            Some(MapPoint {
                label: r.observation.microregion.clone(),
                longitude,
                latitude,
                value: r.tb_rate?,
            })
        })
        .collect()
}

fn explore_stage(
    data: &DerivedDataset,
    config: &AnalysisConfig,
    sink: &mut PlotSink,
) -> Result<ExploratoryReport, PipelineError> {
    let report = explore::summarize(data);
    println!("\nDataset overview:\n{report}");
    if let Some(rate) = report.column("tb_rate") {
        println!(
            "TB incidence rate over {} rows: median {:.5}, mean {:.5}, range [{:.5}, {:.5}]",
            rate.n, rate.median, rate.mean, rate.min, rate.max
        );
    }

    let rates: Vec<f64> = data.records.iter().filter_map(|r| r.tb_rate).collect();
    let log_rates: Vec<f64> = data.records.iter().filter_map(|r| r.log_tb_rate).collect();
    sink.emit("hist_tb_rate.svg", || {
        plots::histogram_svg("Distribution of TB incidence rate", "tb_rate", &rates, HISTOGRAM_BINS)
    })?;
    sink.emit("hist_log_tb_rate.svg", || {
        plots::histogram_svg(
            "Distribution of log TB incidence rate",
            "log_tb_rate",
            &log_rates,
            HISTOGRAM_BINS,
        )
    })?;
    let groups: Vec<(String, Vec<f64>)> = data
        .year_levels
        .iter()
        .map(|year| {
            let values = data
                .records
                .iter()
                .filter(|r| &r.year_label == year)
                .filter_map(|r| r.log_tb_rate)
                .collect();
            (year.clone(), values)
        })
        .collect();
    sink.emit("box_log_tb_rate_by_year.svg", || {
        plots::boxplot_svg("log TB incidence rate by year", "log_tb_rate", &groups)
    })?;
    for year in &data.year_levels {
        let points = rate_map_points(data, year);
        sink.emit(&format!("map_tb_rate_{year}.svg"), || {
            plots::choropleth_svg(&format!("TB incidence rate, {year}"), &points, config.map_bins)
        })?;
    }
    Ok(report)
}

fn correlate_stage(
    data: &DerivedDataset,
    sink: &mut PlotSink,
) -> Result<CorrelationMatrix, PipelineError> {
    let matrix = correlation::pairwise_pearson(data, &Covariate::ALL);
    println!("\nCovariate correlations (pairwise complete):\n{matrix}");
    let strong = matrix.strongest_pairs(STRONG_CORRELATION);
    if strong.is_empty() {
        println!("No covariate pairs with |r| >= {STRONG_CORRELATION}.");
    }
    for pair in &strong {
        println!(
            "Strong correlation: {} ~ {}: r = {:.3} (n = {})",
            pair.first, pair.second, pair.r, pair.n
        );
    }
    let labels = matrix.labels();
    sink.emit("correlation_heatmap.svg", || {
        plots::heatmap_svg("Covariate correlation matrix", &labels, &matrix.values)
    })?;
    Ok(matrix)
}

fn fit_stage(
    data: &DerivedDataset,
    config: &AnalysisConfig,
) -> Result<Vec<FittedModel>, PipelineError> {
    let fitted = models::fit_all(data, &config.modeling)?;
    for model in &fitted {
        println!("\nModel {}: {}", model.kind, model.formula);
        println!("{}", model.summary);
        let significant: Vec<&str> = model
            .summary
            .significant_smooths(SIGNIFICANCE_LEVEL)
            .iter()
            .map(|t| t.term.as_str())
            .collect();
        if significant.is_empty() {
            println!("No smooth terms significant at {SIGNIFICANCE_LEVEL}.");
        } else {
            println!(
                "Smooth terms significant at {SIGNIFICANCE_LEVEL}: {}",
                significant.join(", ")
            );
        }
    }
    Ok(fitted)
}

fn risk_stage(
    data: &DerivedDataset,
    comparison: &ModelComparison<'_>,
    config: &AnalysisConfig,
    sink: &mut PlotSink,
) -> Result<RiskAssessment, PipelineError> {
    let assessment = risk::assess(data, &comparison.selected, config.risk_percentile);
    println!(
        "\nHigh-risk observations (residual > p{:.0} = {:.4}): {} of {}",
        config.risk_percentile * 100.0,
        assessment.threshold,
        assessment.flagged_count(),
        assessment.residual_count()
    );
    for year in &assessment.per_year {
        println!("  {}: {} of {} flagged", year.year, year.flagged, year.observations);
    }

    let latest = data.year_levels.last().cloned();
    let map_year = match config.map_year.map(|y| y.to_string()) {
        Some(y) if data.year_levels.contains(&y) => Some(y),
        Some(y) => {
            log::warn!("Map year {y} is not in the data; using the latest year instead.");
            latest
        }
        None => latest,
    };
    if let Some(year) = map_year {
        let flags = assessment.flagged_regions(data, &year);
        let points: Vec<MapPoint> = rate_map_points(data, &year)
            .into_iter()
            .map(|p| MapPoint {
                value: if flags.get(&p.label).copied().unwrap_or(false) { 1.0 } else { 0.0 },
                ..p
            })
            .collect();
        sink.emit(&format!("map_high_risk_{year}.svg"), || {
            plots::choropleth_svg(&format!("High-risk microregions, {year}"), &points, 2)
        })?;
    }

    let model = comparison.selected.model();
    let pairs: Vec<(f64, f64)> = model
        .fit
        .fitted_values
        .iter()
        .copied()
        .zip(model.fit.residuals.iter().copied())
        .collect();
    let residuals = model.fit.residuals.to_vec();
    let label = model.kind.label();
    sink.emit("diagnostic_residuals_vs_fitted.svg", || {
        plots::scatter_svg(
            &format!("Model {label}: residuals vs fitted"),
            "Fitted log_tb_rate",
            "Residual",
            &pairs,
            Some(0.0),
        )
    })?;
    sink.emit("diagnostic_qq.svg", || {
        plots::qq_svg(&format!("Model {label}: normal QQ plot of residuals"), &residuals)
    })?;
    sink.emit("diagnostic_residual_histogram.svg", || {
        plots::histogram_svg(
            &format!("Model {label}: residual distribution"),
            "Residual",
            &residuals,
            HISTOGRAM_BINS,
        )
    })?;
    Ok(assessment)
}

fn temporal_stage(
    data: &DerivedDataset,
    sink: &mut PlotSink,
) -> Result<Vec<YearSummary>, PipelineError> {
    let summaries = temporal::summarize_by_year(data);
    println!("\nTB incidence rate by year:\n{}", temporal::format_table(&summaries));
    let series: Vec<(f64, f64, f64)> = summaries
        .iter()
        .filter_map(|s| Some((s.year.parse::<f64>().ok()?, s.mean_rate, s.sd_rate)))
        .collect();
    sink.emit("temporal_trend.svg", || {
        plots::line_chart_svg("Mean TB incidence rate by year (±1 SD)", "Year", "tb_rate", &series)
    })?;
    Ok(summaries)
}
