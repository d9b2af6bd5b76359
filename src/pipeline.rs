//! The stage sequencer.
//!
//! Turns user intent into an ordered stage plan, runs the plan, and reports
//! one outcome per stage. A stage that fails does not stop later requested
//! stages; every stage's result lands in the summary ("best-effort batch").

use anyhow::{bail, Result};

use crate::config::Config;
use crate::context::{BuildContext, SourceState};
use crate::ui::{self, Confirm, Level};
use crate::{compile, configure, image, qemu, source};

/// One discrete pipeline step, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Configure,
    Compile,
    Image,
    Run,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Configure => "configure",
            Stage::Compile => "compile",
            Stage::Image => "image",
            Stage::Run => "run",
        }
    }
}

/// The action flags from the CLI, as data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Intent {
    pub download: bool,
    pub configure: bool,
    pub compile: bool,
    pub image: bool,
    pub run: bool,
    pub all: bool,
}

/// Outcome of one stage.
#[derive(Debug)]
pub enum StageStatus {
    /// Ran and exited zero.
    Passed,
    /// Ran but reported failure (exit code).
    Failed(i32),
    /// Could not run: launch failure, invalid input, missing prerequisite.
    Aborted(anyhow::Error),
}

impl StageStatus {
    pub fn passed(&self) -> bool {
        matches!(self, StageStatus::Passed)
    }
}

/// A stage paired with how it went.
#[derive(Debug)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
}

/// Compute the ordered stage plan from user intent.
///
/// `all` expands to the full chain; an explicit source path disables
/// download (the tree is already on disk), a version enables it. `all`
/// with neither is a usage error. The returned order is dependency order
/// regardless of how the flags were given.
pub fn plan(intent: &Intent, has_version: bool, has_path: bool) -> Result<Vec<Stage>> {
    let mut download = intent.download;
    let mut configure = intent.configure;
    let mut compile = intent.compile;
    let mut image = intent.image;
    let mut run = intent.run;

    if intent.all {
        if !has_version && !has_path {
            bail!("Please provide a kernel version with -k, or a kernel path with -p");
        }
        download = has_version;
        configure = true;
        compile = true;
        image = true;
        run = true;
    }
    if has_path {
        download = false;
    }

    let selected = [
        (Stage::Download, download),
        (Stage::Configure, configure),
        (Stage::Compile, compile),
        (Stage::Image, image),
        (Stage::Run, run),
    ];
    Ok(selected
        .into_iter()
        .filter_map(|(stage, wanted)| wanted.then_some(stage))
        .collect())
}

/// Run the planned stages in order and report each outcome.
///
/// The download stage's [`SourceState`] is owned here; a fetch that did not
/// complete counts as the stage failing (and extraction was already
/// short-circuited inside the stage), while a missing-but-reported source
/// tree is the next stage's problem, surfaced by its own tooling.
pub fn execute(
    ctx: &BuildContext,
    config: &Config,
    stages: &[Stage],
    expected_sha256: Option<&str>,
    confirm: &mut dyn Confirm,
) -> Vec<StageReport> {
    let mut reports = Vec::new();

    for &stage in stages {
        ui::say(Level::Info, &format!("Stage: {}", stage.name()));

        let status = match stage {
            Stage::Download => match source::acquire(ctx, config, expected_sha256, confirm) {
                Ok(state) => {
                    report_source_state(state);
                    if state.downloaded {
                        StageStatus::Passed
                    } else {
                        StageStatus::Failed(1)
                    }
                }
                Err(e) => StageStatus::Aborted(e),
            },
            Stage::Configure => from_code(configure::configure(ctx)),
            Stage::Compile => from_code(compile::compile(ctx)),
            Stage::Image => from_code(image::build_image(ctx, config)),
            Stage::Run => from_code(qemu::run_image(ctx)),
        };

        reports.push(StageReport { stage, status });
    }

    print_summary(&reports);
    reports
}

/// True when every stage in the batch passed.
pub fn all_passed(reports: &[StageReport]) -> bool {
    reports.iter().all(|r| r.status.passed())
}

fn from_code(result: Result<i32>) -> StageStatus {
    match result {
        Ok(0) => StageStatus::Passed,
        Ok(code) => StageStatus::Failed(code),
        Err(e) => StageStatus::Aborted(e),
    }
}

fn report_source_state(state: SourceState) {
    ui::say(
        Level::Info,
        &format!(
            "Source state: downloaded={}, extracted={}",
            state.downloaded, state.extracted
        ),
    );
}

fn print_summary(reports: &[StageReport]) {
    for report in reports {
        match &report.status {
            StageStatus::Passed => {
                ui::say(Level::Good, &format!("{}: ok", report.stage.name()));
            }
            StageStatus::Failed(code) => {
                ui::say(
                    Level::Fail,
                    &format!("{}: exit code {}", report.stage.name(), code),
                );
            }
            StageStatus::Aborted(e) => {
                ui::say(Level::Fail, &format!("{}: {:#}", report.stage.name(), e));
            }
        }
    }
}
