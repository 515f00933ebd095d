//! Per-step outcome log of a scenario run.

use crate::capture::ScreenshotArtifact;
use crate::dialog::DialogResolution;
use crate::driver::ElementHandle;
use crate::result::VigilResult;
use crate::visual_regression::BaselineCheck;
use serde::Serialize;
use std::time::Duration;

/// Run state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Not started
    Pending,
    /// Executing a step
    Running {
        /// Current step
        step_index: usize,
    },
    /// Every step ran
    Completed,
    /// A fatal step failed
    Aborted {
        /// Failing step
        at_step: usize,
        /// Failure message
        cause: String,
    },
}

impl RunState {
    /// Whether the run reached a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted { .. })
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running { step_index } => write!(f, "running step {step_index}"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted { at_step, cause } => write!(f, "aborted at step {at_step}: {cause}"),
        }
    }
}

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step succeeded
    Passed,
    /// Step failed; the run continued
    Failed,
    /// Step failed and ended the run
    Aborted,
    /// Not executed because of an earlier abort
    Skipped,
}

impl StepStatus {
    const fn marker(self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Aborted => "ABORT",
            Self::Skipped => "SKIP",
        }
    }
}

/// Wait performed during a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitRecord {
    /// Condition description
    pub condition: String,
    /// Whether it held
    pub satisfied: bool,
    /// Time spent
    pub elapsed_ms: u64,
    /// Whether the runner inserted the wait itself
    pub implicit: bool,
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Position in the scenario
    pub index: usize,
    /// Step name
    pub name: String,
    /// Action label
    pub kind: &'static str,
    /// Status
    pub status: StepStatus,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time spent in the step
    pub elapsed_ms: u64,
    /// Waits performed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waits: Vec<WaitRecord>,
    /// Element handed to the next step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<ElementHandle>,
    /// Dialog handling result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog: Option<DialogResolution>,
    /// Artifact written by the step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ScreenshotArtifact>,
    /// Baseline comparison
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineCheck>,
}

impl StepOutcome {
    /// Outcome with no details yet
    #[must_use]
    pub fn new(index: usize, name: impl Into<String>, kind: &'static str, status: StepStatus) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
            status,
            error: None,
            elapsed_ms: 0,
            waits: Vec::new(),
            matched: None,
            dialog: None,
            artifact: None,
            baseline: None,
        }
    }

    /// Skipped step
    #[must_use]
    pub fn skipped(index: usize, name: impl Into<String>, kind: &'static str) -> Self {
        Self::new(index, name, kind, StepStatus::Skipped)
    }

    /// One summary line
    #[must_use]
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "[{}] {:>2} {} ({}, {}ms)",
            self.status.marker(),
            self.index,
            self.name,
            self.kind,
            self.elapsed_ms
        );
        if let Some(error) = &self.error {
            line.push_str(": ");
            line.push_str(error);
        }
        line
    }
}

/// Result of a scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: String,
    /// Final run state
    pub state: RunState,
    /// One entry per declared step
    pub outcomes: Vec<StepOutcome>,
    /// Every artifact written, including teardown captures
    pub artifacts: Vec<ScreenshotArtifact>,
    /// Problems during teardown
    pub teardown_errors: Vec<String>,
    /// Wall-clock run time
    pub duration: Duration,
}

impl ScenarioReport {
    /// Empty report for `scenario`
    #[must_use]
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            state: RunState::Pending,
            outcomes: Vec::new(),
            artifacts: Vec::new(),
            teardown_errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Whether every step ran
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.state, RunState::Completed)
    }

    /// Failed or aborted steps
    #[must_use]
    pub fn failures(&self) -> Vec<&StepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, StepStatus::Failed | StepStatus::Aborted))
            .collect()
    }

    /// Number of failed or aborted steps
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().len()
    }

    /// Failures other than capture steps
    #[must_use]
    pub fn functional_failure_count(&self) -> usize {
        self.failures().iter().filter(|o| o.kind != "capture").count()
    }

    /// Baseline checks in step order
    #[must_use]
    pub fn baseline_checks(&self) -> Vec<&BaselineCheck> {
        self.outcomes.iter().filter_map(|o| o.baseline.as_ref()).collect()
    }

    /// Plain-text report
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let passed = self
            .outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Passed)
            .count();
        let mut lines = vec![format!(
            "{}: {} ({}/{} steps passed, {} artifacts, {:.2}s)",
            self.scenario,
            self.state,
            passed,
            self.outcomes.len(),
            self.artifacts.len(),
            self.duration.as_secs_f64()
        )];
        lines.extend(self.outcomes.iter().map(StepOutcome::summary_line));
        lines.extend(
            self.teardown_errors
                .iter()
                .map(|e| format!("[TEARDOWN] {e}")),
        );
        lines
    }

    /// Pretty JSON
    pub fn to_json(&self) -> VigilResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn report() -> ScenarioReport {
        let mut report = ScenarioReport::new("todo");
        let mut ok = StepOutcome::new(0, "open", "navigate", StepStatus::Passed);
        ok.elapsed_ms = 12;
        let mut bad = StepOutcome::new(1, "login", "wait_for", StepStatus::Aborted);
        bad.error = Some("Timed out".into());
        report.outcomes = vec![ok, bad, StepOutcome::skipped(2, "add", "click")];
        report.state = RunState::Aborted {
            at_step: 1,
            cause: "Timed out".into(),
        };
        report
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert!(!report.is_completed());
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.functional_failure_count(), 1);
    }

    #[test]
    fn test_summary_lines() {
        let lines = report().summary_lines();
        assert!(lines[0].starts_with("todo: aborted at step 1: Timed out (1/3 steps passed"));
        assert_eq!(lines[1], "[PASS]  0 open (navigate, 12ms)");
        assert_eq!(lines[2], "[ABORT]  1 login (wait_for, 0ms): Timed out");
        assert_eq!(lines[3], "[SKIP]  2 add (click, 0ms)");
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        assert_eq!(json["state"]["state"], "aborted");
        assert_eq!(json["outcomes"][2]["status"], "skipped");
        assert!(json["outcomes"][0].get("error").is_none());
    }

    #[test]
    fn test_json_includes_baseline_check() {
        let mut report = report();
        report.outcomes[0].baseline = Some(BaselineCheck::Missing {
            baseline: std::path::PathBuf::from("tests/baselines/login_page.png"),
        });
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let check = &json["outcomes"][0]["baseline"];
        assert_eq!(check["check"], "missing");
        assert_eq!(check["baseline"], "tests/baselines/login_page.png");
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(!RunState::Pending.is_terminal());
        assert!(!RunState::Running { step_index: 0 }.is_terminal());
        assert!(RunState::Completed.is_terminal());
    }
}
