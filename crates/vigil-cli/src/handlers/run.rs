//! `vigil run`: drive a scenario through Chromium

use crate::commands::RunArgs;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use std::path::Path;
use tracing::info;
use vigil::scenario::CaptureDensity;
use vigil::todo::{todo_regression_scenario, TodoScenarioConfig};
use vigil::{BrowserDriver, HarnessConfig, Scenario, ScenarioReport, ScenarioRunner, Session};

/// Harness configuration from the config file plus command-line overrides
pub fn resolve_config(args: &RunArgs) -> CliResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(url) = &args.url {
        config = config.with_base_url(url.clone());
    }
    if args.headed {
        config = config.with_headless(false);
    }
    if args.no_sandbox {
        config.browser.sandbox = false;
    }
    if let Some(dir) = &args.artifacts {
        config = config.with_artifact_dir(dir.clone());
    }
    if let Some(dir) = &args.baselines {
        config = config.with_baseline_dir(dir.clone());
    }
    if args.update_baselines {
        config = config.with_update_baselines(true);
    }
    if args.every_step {
        config = config.with_density(CaptureDensity::EveryStep);
    }
    config.validate()?;
    Ok(config)
}

/// Scenario file, or the built-in todo scenario
pub fn load_scenario(args: &RunArgs) -> CliResult<Scenario> {
    match &args.scenario {
        Some(path) => Ok(Scenario::load(path)?),
        None => Ok(todo_regression_scenario(&TodoScenarioConfig::default())),
    }
}

/// Run `scenario` on an already launched driver
pub fn run_with_driver(
    driver: Box<dyn BrowserDriver>,
    config: &HarnessConfig,
    scenario: &Scenario,
) -> ScenarioReport {
    let session = Session::new(driver, config.session_config());
    ScenarioRunner::new(config.run_config()).run(session, scenario)
}

/// Exit status of a finished run: aborted runs and failing steps are errors.
///
/// Capture failures alone never fail the run.
pub fn check_report(report: &ScenarioReport) -> CliResult<()> {
    if !report.is_completed() {
        return Err(CliError::scenario_failed(
            &report.scenario,
            report.state.to_string(),
        ));
    }
    match report.functional_failure_count() {
        0 => Ok(()),
        1 => Err(CliError::scenario_failed(&report.scenario, "1 step failed")),
        n => Err(CliError::scenario_failed(
            &report.scenario,
            format!("{n} steps failed"),
        )),
    }
}

/// Execute the run command
pub fn execute_run(args: &RunArgs, reporter: &Reporter) -> CliResult<()> {
    let config = resolve_config(args)?;
    let scenario = load_scenario(args)?;
    info!(scenario = %scenario.name, base_url = %config.base_url, "starting run");

    let driver = launch(&config)?;
    let report = run_with_driver(driver, &config, &scenario);
    reporter.report(&report);

    if let Some(path) = &args.report {
        write_report(&report, path)?;
        reporter.info(&format!("Report written to {}", path.display()));
    }
    check_report(&report)
}

fn write_report(report: &ScenarioReport, path: &Path) -> CliResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, report.to_json()?)?;
    Ok(())
}

#[cfg(feature = "browser")]
fn launch(config: &HarnessConfig) -> CliResult<Box<dyn BrowserDriver>> {
    Ok(Box::new(vigil::ChromiumDriver::launch(config.driver_config())?))
}

#[cfg(not(feature = "browser"))]
fn launch(_config: &HarnessConfig) -> CliResult<Box<dyn BrowserDriver>> {
    Err(CliError::config(
        "vigil was built without the `browser` feature; rebuild with --features browser",
    ))
}
