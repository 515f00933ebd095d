//! Scenario runner.
//!
//! Executes steps strictly in order. A failing step with a `Fatal` policy
//! aborts the run; `NonFatal` failures are recorded and the run continues.
//! Capture failures never abort. Teardown (final capture, session close) runs
//! whatever the outcome.

use super::report::{RunState, ScenarioReport, StepOutcome, StepStatus, WaitRecord};
use super::step::{FailurePolicy, Scenario, Step, StepKind, Target};
use crate::capture::{CaptureConfig, CaptureMode, ScreenshotArtifact, ScreenshotCapture};
use crate::condition::Condition;
use crate::dialog::{DialogInterceptor, DialogInterceptorConfig};
use crate::driver::ElementHandle;
use crate::result::{VigilError, VigilResult};
use crate::session::Session;
use crate::visual_regression::BaselineStore;
use crate::wait::WaitOutcome;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often diagnostic screenshots are taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureDensity {
    /// Only at explicit capture steps
    #[default]
    Checkpoints,
    /// Also a viewport capture after every executed step
    EveryStep,
}

/// Runner settings
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Screenshot settings
    pub capture: CaptureConfig,
    /// Diagnostic capture density
    pub density: CaptureDensity,
    /// Take a viewport capture during teardown
    pub final_capture: bool,
    /// Dialog interceptor timing
    pub dialog: DialogInterceptorConfig,
    /// Baselines for `CompareBaseline` steps
    pub baselines: Option<BaselineStore>,
}

impl RunConfig {
    /// Settings writing artifacts to `capture`
    #[must_use]
    pub fn new(capture: CaptureConfig) -> Self {
        Self {
            capture,
            final_capture: true,
            ..Self::default()
        }
    }

    /// Set the capture density
    #[must_use]
    pub const fn with_density(mut self, density: CaptureDensity) -> Self {
        self.density = density;
        self
    }

    /// Enable or disable the teardown capture
    #[must_use]
    pub const fn with_final_capture(mut self, enabled: bool) -> Self {
        self.final_capture = enabled;
        self
    }

    /// Set dialog timing
    #[must_use]
    pub const fn with_dialog(mut self, dialog: DialogInterceptorConfig) -> Self {
        self.dialog = dialog;
        self
    }

    /// Attach a baseline store
    #[must_use]
    pub fn with_baselines(mut self, store: BaselineStore) -> Self {
        self.baselines = Some(store);
        self
    }
}

/// Data threaded from one step to the next
#[derive(Debug, Default)]
struct RunContext {
    /// Element from the immediately preceding wait
    last_match: Option<ElementHandle>,
    /// An async-triggering action ran with no wait since
    unsynchronized: bool,
    /// Most recent artifact from a capture step
    last_artifact: Option<ScreenshotArtifact>,
}

/// Executes scenarios against a session
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: RunConfig,
    capture: ScreenshotCapture,
    interceptor: DialogInterceptor,
}

impl ScenarioRunner {
    /// Create a runner
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            capture: ScreenshotCapture::new(config.capture.clone()),
            interceptor: DialogInterceptor::new(config.dialog),
            config,
        }
    }

    /// Runner settings
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `scenario`, consuming the session. The session is closed before
    /// this returns.
    pub fn run(&self, mut session: Session, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();
        let mut report = ScenarioReport::new(&scenario.name);
        let mut ctx = RunContext::default();
        info!(scenario = %scenario.name, steps = scenario.len(), "scenario started");

        for (index, step) in scenario.steps.iter().enumerate() {
            if let RunState::Aborted { .. } = report.state {
                debug!(step = %step.name, "skipped");
                report
                    .outcomes
                    .push(StepOutcome::skipped(index, &step.name, step.kind.label()));
                continue;
            }
            report.state = RunState::Running { step_index: index };

            let outcome = self.run_step(&mut session, index, step, &mut ctx, &mut report);
            if outcome.status == StepStatus::Aborted {
                report.state = RunState::Aborted {
                    at_step: index,
                    cause: outcome.error.clone().unwrap_or_default(),
                };
            }
            report.outcomes.push(outcome);

            if self.config.density == CaptureDensity::EveryStep
                && !matches!(report.state, RunState::Aborted { .. })
            {
                let name = format!("{}_{:02}_{}", scenario.name, index, step.name);
                self.diagnostic_capture(&mut session, &name, &mut report);
            }
        }

        if !matches!(report.state, RunState::Aborted { .. }) {
            report.state = RunState::Completed;
        }
        self.teardown(session, scenario, &mut report);
        report.duration = started.elapsed();

        match &report.state {
            RunState::Aborted { at_step, cause } => {
                warn!(scenario = %scenario.name, at_step, cause = %cause, "scenario aborted");
            }
            _ => info!(
                scenario = %scenario.name,
                failures = report.failure_count(),
                elapsed_ms = report.duration.as_millis() as u64,
                "scenario completed"
            ),
        }
        report
    }

    fn run_step(
        &self,
        session: &mut Session,
        index: usize,
        step: &Step,
        ctx: &mut RunContext,
        report: &mut ScenarioReport,
    ) -> StepOutcome {
        info!(step = %step.name, index, action = step.kind.label(), "step started");
        let started = Instant::now();
        let mut outcome = StepOutcome::new(index, &step.name, step.kind.label(), StepStatus::Passed);

        // A matched element is only good for the step right after the wait.
        let matched = ctx.last_match.take();
        let result = self.execute(session, step, matched, ctx, &mut outcome);
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;

        if let Some(artifact) = &outcome.artifact {
            report.artifacts.push(artifact.clone());
        }

        match result {
            Ok(()) => {
                info!(step = %step.name, elapsed_ms = outcome.elapsed_ms, "step passed");
            }
            Err(e) => {
                let policy = match (&step.kind, &e) {
                    (_, VigilError::CaptureFailure { .. }) | (StepKind::Capture { .. }, _) => {
                        FailurePolicy::NonFatal
                    }
                    _ => step.effective_policy(),
                };
                outcome.error = Some(e.to_string());
                outcome.status = match policy {
                    FailurePolicy::Fatal => StepStatus::Aborted,
                    FailurePolicy::NonFatal => StepStatus::Failed,
                };
                warn!(step = %step.name, error = %e, policy = ?policy, "step failed");
            }
        }
        outcome
    }

    fn execute(
        &self,
        session: &mut Session,
        step: &Step,
        matched: Option<ElementHandle>,
        ctx: &mut RunContext,
        outcome: &mut StepOutcome,
    ) -> VigilResult<()> {
        let async_trigger = step.kind.triggers_async();
        match &step.kind {
            StepKind::Navigate { target } => session.navigate(target)?,
            StepKind::Fill { target, text } => {
                let element = resolve_target(session, target, matched, outcome)?;
                session.fill(&element, text)?;
            }
            StepKind::Click { target } => {
                let element = resolve_target(session, target, matched, outcome)?;
                session.click(&element)?;
            }
            StepKind::WaitFor {
                condition,
                timeout_ms,
            } => {
                let options = timeout_ms.map_or(session.config().wait, |ms| {
                    session.config().wait.with_timeout(ms)
                });
                let result = session.wait_for_with(condition, &options)?;
                outcome.waits.push(record(condition, &result, false));
                ctx.unsynchronized = false;
                let element = result.into_match(condition, &options)?;
                outcome.matched.clone_from(&element);
                ctx.last_match = element;
            }
            StepKind::ExpectText { text } => {
                self.expect(session, ctx, outcome, Condition::text_present(text.as_str()))?;
            }
            StepKind::ExpectTextAbsent { text } => {
                self.expect(session, ctx, outcome, Condition::text_absent(text.as_str()))?;
            }
            StepKind::Capture { artifact, mode } => {
                let artifact = self.capture.capture(session.driver_mut()?, artifact, *mode)?;
                ctx.last_artifact = Some(artifact.clone());
                outcome.artifact = Some(artifact);
            }
            StepKind::ResolveDialog {
                mode,
                input,
                timeout_ms,
            } => {
                let driver = session.driver_mut()?;
                let resolution = match timeout_ms {
                    Some(ms) => self.interceptor.resolve(
                        driver,
                        *mode,
                        input.as_deref(),
                        Duration::from_millis(*ms),
                    ),
                    None => self.interceptor.resolve_default(driver, *mode, input.as_deref()),
                };
                outcome.dialog = Some(resolution.clone());
                resolution.into_result()?;
            }
            StepKind::CompareBaseline { baseline } => {
                let store = self
                    .config
                    .baselines
                    .as_ref()
                    .ok_or_else(|| VigilError::config("no baseline store configured"))?;
                let artifact = ctx.last_artifact.as_ref().ok_or_else(|| {
                    VigilError::assertion(format!("no artifact captured before baseline '{baseline}'"))
                })?;
                let check = store.check(baseline, artifact)?;
                let ok = check.is_ok();
                let message = format!("baseline '{baseline}': {check}");
                outcome.baseline = Some(check);
                if !ok {
                    return Err(VigilError::assertion(message));
                }
            }
        }
        if async_trigger {
            ctx.unsynchronized = true;
        }
        Ok(())
    }

    /// Text assertion, preceded by a wait when the page may still be changing
    fn expect(
        &self,
        session: &Session,
        ctx: &mut RunContext,
        outcome: &mut StepOutcome,
        condition: Condition,
    ) -> VigilResult<()> {
        if ctx.unsynchronized {
            let result = session.wait_for(&condition)?;
            outcome.waits.push(record(&condition, &result, true));
            ctx.unsynchronized = false;
            if !result.is_satisfied() {
                return Err(VigilError::assertion(format!(
                    "expected {condition} within {}ms",
                    session.config().wait.timeout_ms
                )));
            }
            return Ok(());
        }
        let text = session.page_text()?;
        let holds = match &condition {
            Condition::TextPresent { text: t, .. } => text.contains(t.as_str()),
            Condition::TextAbsent { text: t, .. } => !text.contains(t.as_str()),
            _ => true,
        };
        if holds {
            Ok(())
        } else {
            Err(VigilError::assertion(format!("expected {condition}")))
        }
    }

    fn diagnostic_capture(&self, session: &mut Session, name: &str, report: &mut ScenarioReport) {
        let result = session
            .driver_mut()
            .and_then(|driver| self.capture.capture(driver, name, CaptureMode::Viewport));
        match result {
            Ok(artifact) => report.artifacts.push(artifact),
            Err(e) => warn!(capture = name, error = %e, "diagnostic capture failed"),
        }
    }

    fn teardown(&self, mut session: Session, scenario: &Scenario, report: &mut ScenarioReport) {
        if self.config.final_capture {
            let name = format!("{}_final", scenario.name);
            let result = session
                .driver_mut()
                .and_then(|driver| self.capture.capture(driver, &name, CaptureMode::Viewport));
            match result {
                Ok(artifact) => report.artifacts.push(artifact),
                Err(e) => {
                    warn!(error = %e, "final capture failed");
                    report.teardown_errors.push(e.to_string());
                }
            }
        }
        if let Err(e) = session.close() {
            warn!(error = %e, "session close failed");
            report.teardown_errors.push(e.to_string());
        }
    }
}

fn resolve_target(
    session: &Session,
    target: &Target,
    matched: Option<ElementHandle>,
    outcome: &mut StepOutcome,
) -> VigilResult<ElementHandle> {
    match target {
        Target::Matched => matched.ok_or(VigilError::NoMatchedElement),
        Target::Locator(locator) => {
            let condition = Condition::ElementClickable(locator.clone());
            let options = session.config().wait;
            let result = session.wait_for_with(&condition, &options)?;
            outcome.waits.push(record(&condition, &result, true));
            result
                .into_match(&condition, &options)?
                .ok_or_else(|| VigilError::ElementNotFound {
                    locator: locator.to_string(),
                })
        }
    }
}

fn record(condition: &Condition, outcome: &WaitOutcome, implicit: bool) -> WaitRecord {
    WaitRecord {
        condition: condition.to_string(),
        satisfied: outcome.is_satisfied(),
        elapsed_ms: outcome.elapsed().as_millis() as u64,
        implicit,
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new(RunConfig::new(CaptureConfig::default()))
    }
}
