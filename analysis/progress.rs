use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;
use std::io::IsTerminal;

/// Stages of the analysis pipeline, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Load,
    Derive,
    Explore,
    Correlate,
    Fit,
    Select,
    Risk,
    Temporal,
    Persist,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 9] = [
        Self::Load,
        Self::Derive,
        Self::Explore,
        Self::Correlate,
        Self::Fit,
        Self::Select,
        Self::Risk,
        Self::Temporal,
        Self::Persist,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            Self::Load => "loading data",
            Self::Derive => "deriving incidence rates",
            Self::Explore => "exploratory summaries",
            Self::Correlate => "covariate correlations",
            Self::Fit => "fitting additive models",
            Self::Select => "model selection",
            Self::Risk => "residual risk analysis",
            Self::Temporal => "temporal summary",
            Self::Persist => "saving results",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer notified as the pipeline moves through its stages.
pub trait StageObserver {
    fn on_stage_start(&mut self, _stage: PipelineStage) {}
    fn on_stage_finish(&mut self, _stage: PipelineStage) {}
}

#[derive(Default)]
pub struct NoopStageObserver;

impl StageObserver for NoopStageObserver {}

/// Draws a stage counter on stderr when it is a terminal.
pub struct ConsoleStageObserver {
    bar: ProgressBar,
}

impl ConsoleStageObserver {
    pub fn new() -> Self {
        let draw_target = if std::io::stderr().is_terminal() {
            ProgressDrawTarget::stderr_with_hz(10)
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(PipelineStage::ALL.len() as u64), draw_target);
        if let Ok(style) =
            ProgressStyle::with_template("> [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        Self { bar }
    }
}

impl Default for ConsoleStageObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StageObserver for ConsoleStageObserver {
    fn on_stage_start(&mut self, stage: PipelineStage) {
        self.bar.set_message(stage.describe());
    }

    fn on_stage_finish(&mut self, stage: PipelineStage) {
        self.bar.inc(1);
        if stage == PipelineStage::Persist {
            self.bar.finish_with_message("done");
        }
    }
}
