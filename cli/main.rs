#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;

use tbgam::config::AnalysisConfig;
use tbgam::gam::basis::KnotStrategy;
use tbgam::gam::model::{BasisConfig, RemlConfig};
use tbgam::models::ModelingConfig;
use tbgam::pipeline;
use tbgam::progress::ConsoleStageObserver;

#[derive(Clone, ValueEnum)]
pub enum KnotStrategyCli {
    Uniform,
    Quantile,
}

impl From<KnotStrategyCli> for KnotStrategy {
    fn from(value: KnotStrategyCli) -> Self {
        match value {
            KnotStrategyCli::Uniform => KnotStrategy::Uniform,
            KnotStrategyCli::Quantile => KnotStrategy::Quantile,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "tbgam",
    version,
    about = "Additive-model analysis of tuberculosis incidence across microregions"
)]
pub struct Cli {
    /// Path to the microregion-year CSV or TSV file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Directory receiving results.toml, the augmented CSV and plots/
    #[arg(long, default_value = "tbgam_output")]
    pub output_dir: PathBuf,

    /// Number of internal knots for each covariate spline basis
    #[arg(long, default_value = "6")]
    pub covariate_knots: usize,

    /// Polynomial degree for the covariate spline bases
    #[arg(long, default_value = "3")]
    pub spline_degree: usize,

    /// Placement of the covariate spline knots
    #[arg(long, value_enum, default_value_t = KnotStrategyCli::Uniform)]
    pub knot_strategy: KnotStrategyCli,

    /// Order of the difference penalty matrix
    #[arg(long, default_value = "2")]
    pub penalty_order: usize,

    /// Upper bound on the number of thin-plate knots for spatial surfaces
    #[arg(long, default_value = "30")]
    pub spatial_knots: usize,

    /// Also penalize each smooth's null space so whole terms can shrink to zero.
    /// Needed when the panel has no more rows than unpenalized coefficients
    /// (intercept, year contrasts and one linear direction per smooth), which
    /// otherwise fails with an insufficient-data error
    #[arg(long)]
    pub null_space_penalty: bool,

    /// Maximum number of iterations for the REML/BFGS optimization
    #[arg(long, default_value = "100")]
    pub reml_max_iterations: usize,

    /// Convergence tolerance for the gradient norm in the REML/BFGS loop
    #[arg(long, default_value = "1e-3")]
    pub reml_convergence_tolerance: f64,

    /// Residual percentile above which an observation is flagged high-risk
    #[arg(long, default_value = "0.95")]
    pub risk_percentile: f64,

    /// Number of colour bins on the maps
    #[arg(long, default_value = "5")]
    pub map_bins: usize,

    /// Year shown on the high-risk map (defaults to the latest year)
    #[arg(long, value_name = "YEAR")]
    pub map_year: Option<i64>,

    /// Skip writing SVG plots
    #[arg(long)]
    pub no_plots: bool,
}

impl Cli {
    fn into_config(self) -> AnalysisConfig {
        let mut config = AnalysisConfig::new(self.input, self.output_dir);
        config.risk_percentile = self.risk_percentile;
        config.map_bins = self.map_bins;
        config.map_year = self.map_year;
        config.plots = !self.no_plots;
        config.modeling = ModelingConfig {
            spatial_knots: self.spatial_knots,
            null_space_penalty: self.null_space_penalty,
            covariate_basis: BasisConfig {
                num_knots: self.covariate_knots,
                degree: self.spline_degree,
                penalty_order: self.penalty_order,
                knot_strategy: self.knot_strategy.into(),
            },
            reml: RemlConfig {
                max_iterations: self.reml_max_iterations,
                convergence_tolerance: self.reml_convergence_tolerance,
            },
        };
        config
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.into_config();
    println!("Loading data from: {}", config.input.display());
    let mut observer = ConsoleStageObserver::new();
    let report = pipeline::run(&config, &mut observer)?;
    println!(
        "Selected model: {} ({} plots written)",
        report.artifact.comparison.selected,
        report.plot_paths.len()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
