//! Onboarding run orchestrator.
//!
//! Ties the pieces of a run together: host list in, authentication check,
//! per-host provisioning and the report files out.

use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;
use color_eyre::{Report as ErrorReport, Result};
use log::{error, info};

use crate::am::{AmClient, CommandRunner};
use crate::config::Config;
use crate::onboarding::{read_hosts, Onboarder, Report};

/// Where the results of a run go.
#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub output_dir: PathBuf,
    pub summary_json: Option<PathBuf>,
}

/// Files written by a finished run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub xlsx: PathBuf,
    pub total: usize,
    pub onboarded: usize,
}

/// Onboard every host listed in `csv_path` and write the report.
///
/// An authorization failure aborts the run before any host is touched, or
/// part way through; in the latter case the partial report is still written.
pub fn run_onboarding<R: CommandRunner>(
    config: &Config,
    client: &AmClient<R>,
    csv_path: &Path,
    outputs: &RunOutputs,
) -> Result<RunResult> {
    let hosts = read_hosts(csv_path, config.onboarding.max_rows)?;

    let onboarder = Onboarder::new(client, config);
    onboarder
        .check_auth()
        .wrap_err("User is not authorized for address management. Exiting.")?;

    let mut report = Report::new(config.onboarding.subnet_prefix);
    let outcome = onboarder.run(&hosts, &mut report);

    let xlsx = report.write_xlsx(&outputs.output_dir, &config.onboarding.report_prefix)?;
    if let Some(summary) = &outputs.summary_json {
        report.write_summary(summary)?;
    }

    if let Err(e) = outcome {
        error!("Run aborted after {} hosts: {}", report.outcomes().len(), e);
        return Err(ErrorReport::new(e).wrap_err("Onboarding run aborted"));
    }

    info!(
        "Onboarded {} of {} hosts; report at {:?}",
        report.onboarded(),
        report.outcomes().len(),
        xlsx
    );
    Ok(RunResult {
        xlsx,
        total: report.outcomes().len(),
        onboarded: report.onboarded(),
    })
}
