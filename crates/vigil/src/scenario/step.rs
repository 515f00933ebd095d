//! Scenario steps.
//!
//! A [`Scenario`] is plain data and round-trips through YAML:
//!
//! ```yaml
//! name: login
//! steps:
//!   - name: open app
//!     type: navigate
//!     target: /
//!   - name: type username
//!     type: fill
//!     target:
//!       locator:
//!         strategy: attribute
//!         selector: placeholder=Username
//!     text: test
//!   - name: logged in
//!     type: wait_for
//!     condition:
//!       text_present:
//!         text: Todo List
//! ```

use crate::capture::CaptureMode;
use crate::condition::Condition;
use crate::dialog::DialogMode;
use crate::locator::Locator;
use crate::result::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What happens to the run when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the remaining steps
    Fatal,
    /// Record the failure and continue
    NonFatal,
}

/// Element an interaction acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Look the element up (auto-waits until clickable)
    Locator(Locator),
    /// Element matched by the immediately preceding wait
    Matched,
}

impl From<Locator> for Target {
    fn from(locator: Locator) -> Self {
        Self::Locator(locator)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locator(l) => write!(f, "{l}"),
            Self::Matched => write!(f, "previous match"),
        }
    }
}

/// Step action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Load a URL (relative to the base URL or absolute)
    Navigate {
        /// URL or path
        target: String,
    },
    /// Replace an input's value
    Fill {
        /// Input element
        target: Target,
        /// New value
        text: String,
    },
    /// Click an element
    Click {
        /// Element to click
        target: Target,
    },
    /// Wait for a condition
    WaitFor {
        /// Condition to await
        condition: Condition,
        /// Overrides the session timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Page text must contain `text`
    ExpectText {
        /// Expected text
        text: String,
    },
    /// Page text must not contain `text`
    ExpectTextAbsent {
        /// Forbidden text
        text: String,
    },
    /// Store a screenshot
    Capture {
        /// Artifact name
        artifact: String,
        /// Viewport or full page
        #[serde(default)]
        mode: CaptureMode,
    },
    /// Resolve the dialog raised by the previous step
    ResolveDialog {
        /// Accept or dismiss
        #[serde(default)]
        mode: DialogMode,
        /// Text for prompt dialogs
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
        /// Overrides the detect budget
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Compare the latest artifact with a stored baseline
    CompareBaseline {
        /// Baseline name
        baseline: String,
    },
}

impl StepKind {
    /// Short action name
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Fill { .. } => "fill",
            Self::Click { .. } => "click",
            Self::WaitFor { .. } => "wait_for",
            Self::ExpectText { .. } => "expect_text",
            Self::ExpectTextAbsent { .. } => "expect_text_absent",
            Self::Capture { .. } => "capture",
            Self::ResolveDialog { .. } => "resolve_dialog",
            Self::CompareBaseline { .. } => "compare_baseline",
        }
    }

    /// Actions whose effects land asynchronously
    #[must_use]
    pub const fn triggers_async(&self) -> bool {
        matches!(
            self,
            Self::Navigate { .. } | Self::Fill { .. } | Self::Click { .. } | Self::ResolveDialog { .. }
        )
    }

    /// Policy used when the step sets none
    #[must_use]
    pub const fn default_policy(&self) -> FailurePolicy {
        match self {
            Self::Capture { .. } | Self::CompareBaseline { .. } => FailurePolicy::NonFatal,
            _ => FailurePolicy::Fatal,
        }
    }
}

/// One orchestrated action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Human-readable name
    pub name: String,
    /// Action
    #[serde(flatten)]
    pub kind: StepKind,
    /// Explicit failure policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<FailurePolicy>,
}

impl Step {
    /// Create a step with the kind's default policy
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            policy: None,
        }
    }

    /// Navigate step
    #[must_use]
    pub fn navigate(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::Navigate {
                target: target.into(),
            },
        )
    }

    /// Fill step
    #[must_use]
    pub fn fill(name: impl Into<String>, target: impl Into<Target>, text: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::Fill {
                target: target.into(),
                text: text.into(),
            },
        )
    }

    /// Click step
    #[must_use]
    pub fn click(name: impl Into<String>, target: impl Into<Target>) -> Self {
        Self::new(
            name,
            StepKind::Click {
                target: target.into(),
            },
        )
    }

    /// Wait step using the session timeout
    #[must_use]
    pub fn wait_for(name: impl Into<String>, condition: Condition) -> Self {
        Self::new(
            name,
            StepKind::WaitFor {
                condition,
                timeout_ms: None,
            },
        )
    }

    /// Text assertion
    #[must_use]
    pub fn expect_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, StepKind::ExpectText { text: text.into() })
    }

    /// Negative text assertion
    #[must_use]
    pub fn expect_text_absent(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, StepKind::ExpectTextAbsent { text: text.into() })
    }

    /// Capture step; the step name doubles as the artifact name
    #[must_use]
    pub fn capture(name: impl Into<String>, mode: CaptureMode) -> Self {
        let artifact = name.into();
        Self::new(artifact.clone(), StepKind::Capture { artifact, mode })
    }

    /// Dialog step
    #[must_use]
    pub fn resolve_dialog(name: impl Into<String>, mode: DialogMode, input: Option<&str>) -> Self {
        Self::new(
            name,
            StepKind::ResolveDialog {
                mode,
                input: input.map(str::to_string),
                timeout_ms: None,
            },
        )
    }

    /// Baseline comparison of the latest artifact
    #[must_use]
    pub fn compare_baseline(baseline: impl Into<String>) -> Self {
        let baseline = baseline.into();
        Self::new(format!("compare {baseline}"), StepKind::CompareBaseline { baseline })
    }

    /// Override the timeout of a wait or dialog step
    #[must_use]
    pub fn with_timeout(mut self, ms: u64) -> Self {
        match &mut self.kind {
            StepKind::WaitFor { timeout_ms, .. } | StepKind::ResolveDialog { timeout_ms, .. } => {
                *timeout_ms = Some(ms);
            }
            _ => {}
        }
        self
    }

    /// Set the failure policy
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Record failures and continue
    #[must_use]
    pub const fn non_fatal(self) -> Self {
        self.with_policy(FailurePolicy::NonFatal)
    }

    /// Abort on failure
    #[must_use]
    pub const fn fatal(self) -> Self {
        self.with_policy(FailurePolicy::Fatal)
    }

    /// Policy in force
    #[must_use]
    pub fn effective_policy(&self) -> FailurePolicy {
        self.policy.unwrap_or_else(|| self.kind.default_policy())
    }
}

/// Ordered list of steps
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Steps in execution order; nested enums are written as single-key maps
    #[serde(default, with = "serde_yaml_ng::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps
    #[must_use]
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there are no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> VigilResult<Self> {
        let scenario: Self = serde_yaml_ng::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a YAML scenario file
    pub fn load(path: &Path) -> VigilResult<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> VigilResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    fn validate(&self) -> VigilResult<()> {
        if self.name.trim().is_empty() {
            return Err(VigilError::config("scenario name must not be empty"));
        }
        if let Some(first) = self.steps.first() {
            if matches!(
                first.kind,
                StepKind::Fill { target: Target::Matched, .. } | StepKind::Click { target: Target::Matched }
            ) {
                return Err(VigilError::config(format!(
                    "step '{}' uses the previous match but is the first step",
                    first.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod policy_tests {
        use super::*;

        #[test]
        fn test_default_policies() {
            assert_eq!(
                Step::navigate("open", "/").effective_policy(),
                FailurePolicy::Fatal
            );
            assert_eq!(
                Step::capture("shot", CaptureMode::Viewport).effective_policy(),
                FailurePolicy::NonFatal
            );
            assert_eq!(
                Step::compare_baseline("todo").effective_policy(),
                FailurePolicy::NonFatal
            );
            assert_eq!(
                Step::compare_baseline("todo").fatal().effective_policy(),
                FailurePolicy::Fatal
            );
        }

        #[test]
        fn test_with_timeout_only_touches_waits() {
            let step = Step::wait_for("w", Condition::DialogPresent).with_timeout(250);
            assert!(matches!(
                step.kind,
                StepKind::WaitFor {
                    timeout_ms: Some(250),
                    ..
                }
            ));
            let click = Step::click("c", Locator::tag("button")).with_timeout(250);
            assert_eq!(click, Step::click("c", Locator::tag("button")));
        }

        #[test]
        fn test_async_triggers() {
            assert!(Step::navigate("n", "/").kind.triggers_async());
            assert!(Step::click("c", Target::Matched).kind.triggers_async());
            assert!(!Step::expect_text("e", "x").kind.triggers_async());
            assert!(!Step::wait_for("w", Condition::DialogPresent).kind.triggers_async());
        }
    }

    mod yaml_tests {
        use super::*;

        const LOGIN_YAML: &str = r"
name: login
steps:
  - name: open app
    type: navigate
    target: /
  - name: username
    type: fill
    target:
      locator:
        strategy: attribute
        selector: placeholder=Username
    text: test
  - name: logged in
    type: wait_for
    condition:
      text_present:
        text: Todo List
    timeout_ms: 2000
  - name: dismiss
    type: resolve_dialog
    mode: dismiss
    policy: non_fatal
  - name: shot
    type: capture
    artifact: after_login
";

        #[test]
        fn test_parse_yaml() {
            let scenario = Scenario::from_yaml_str(LOGIN_YAML).unwrap();
            assert_eq!(scenario.name, "login");
            assert_eq!(scenario.len(), 5);
            assert_eq!(
                scenario.steps[1].kind,
                StepKind::Fill {
                    target: Target::Locator(Locator::attribute("placeholder", "Username")),
                    text: "test".into()
                }
            );
            assert_eq!(scenario.steps[3].effective_policy(), FailurePolicy::NonFatal);
            assert!(matches!(
                scenario.steps[4].kind,
                StepKind::Capture {
                    mode: CaptureMode::Viewport,
                    ..
                }
            ));
        }

        #[test]
        fn test_yaml_round_trip_of_builder_scenario() {
            let scenario = Scenario::new("edit")
                .step(Step::click("edit", Locator::tag("button").with_exact_text("Edit")))
                .step(Step::resolve_dialog("rename", DialogMode::Accept, Some("New")))
                .step(Step::wait_for("renamed", Condition::text_present("New")))
                .step(Step::click("again", Target::Matched));
            let yaml = scenario.to_yaml().unwrap();
            assert!(yaml.contains("type: resolve_dialog"));
            assert_eq!(Scenario::from_yaml_str(&yaml).unwrap(), scenario);
        }

        #[test]
        fn test_nested_enums_are_written_as_maps() {
            let scenario = Scenario::new("scoped")
                .step(Step::wait_for(
                    "form",
                    Condition::ElementPresent(Locator::attribute("placeholder", "Username")),
                ))
                .step(Step::click(
                    "edit",
                    Locator::tag("button")
                        .with_exact_text("Edit")
                        .within(Locator::tag("li").with_text("Milk")),
                ))
                .step(Step::wait_for(
                    "stale entry gone",
                    Condition::TextAbsent {
                        text: "Milk".into(),
                        within: Some(Locator::tag("li").with_exact_text("Milk")),
                    },
                ));
            let yaml = scenario.to_yaml().unwrap();
            assert!(!yaml.contains('!'), "no YAML tags expected:\n{yaml}");
            assert!(yaml.contains("element_present:"));
            assert!(yaml.contains("locator:"));
            assert!(yaml.contains("exact: Edit"));
            assert_eq!(Scenario::from_yaml_str(&yaml).unwrap(), scenario);
        }

        #[test]
        fn test_rejects_empty_name() {
            let err = Scenario::from_yaml_str("name: ''\nsteps: []\n").unwrap_err();
            assert!(matches!(err, VigilError::Config { .. }));
        }

        #[test]
        fn test_rejects_leading_matched_target() {
            let yaml = "name: x\nsteps:\n  - name: c\n    type: click\n    target: matched\n";
            assert!(matches!(
                Scenario::from_yaml_str(yaml),
                Err(VigilError::Config { .. })
            ));
        }

        #[test]
        fn test_unknown_step_type_is_yaml_error() {
            let yaml = "name: x\nsteps:\n  - name: c\n    type: hover\n";
            assert!(matches!(
                Scenario::from_yaml_str(yaml),
                Err(VigilError::Yaml(_))
            ));
        }
    }
}
