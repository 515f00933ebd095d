//! Dialog Interceptor
//!
//! Resolves native alert/confirm/prompt dialogs in two tiers:
//!
//! 1. **Primary**: wait for [`Condition::DialogPresent`] with a short budget.
//! 2. **Fallback**: when the dialog never became observable, pause once for a
//!    fixed delay and then accept/dismiss directly. A missing dialog at that
//!    point is [`DialogResolution::Absent`], not a failure.
//!
//! Every outcome is a typed [`DialogResolution`]; nothing is swallowed.

use crate::condition::Condition;
use crate::driver::BrowserDriver;
use crate::result::{VigilError, VigilResult};
use crate::wait::{WaitOptions, Waiter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog (Leave/Stay buttons)
    BeforeUnload,
}

impl DialogType {
    /// Parse the DevTools dialog type name
    #[must_use]
    pub fn from_protocol(name: &str) -> Self {
        match name {
            "confirm" => Self::Confirm,
            "prompt" => Self::Prompt,
            "beforeunload" => Self::BeforeUnload,
            _ => Self::Alert,
        }
    }
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// Represents a browser dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    /// Type of dialog
    dialog_type: DialogType,
    /// Message displayed in the dialog
    message: String,
    /// Default value (for prompt dialogs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
}

impl Dialog {
    /// Create a new dialog
    #[must_use]
    pub fn new(dialog_type: DialogType, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            message: message.into(),
            default_value: None,
        }
    }

    /// Create an alert dialog
    #[must_use]
    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(DialogType::Alert, message)
    }

    /// Create a confirm dialog
    #[must_use]
    pub fn confirm(message: impl Into<String>) -> Self {
        Self::new(DialogType::Confirm, message)
    }

    /// Create a prompt dialog
    #[must_use]
    pub fn prompt(message: impl Into<String>, default: Option<String>) -> Self {
        let mut dialog = Self::new(DialogType::Prompt, message);
        dialog.default_value = default;
        dialog
    }

    /// Get dialog type
    #[must_use]
    pub const fn dialog_type(&self) -> DialogType {
        self.dialog_type
    }

    /// Get dialog message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get default value (for prompts)
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Error for page operations attempted while this dialog is open
    #[must_use]
    pub fn blocking_error(&self) -> VigilError {
        VigilError::UnexpectedDialog {
            kind: self.dialog_type.to_string(),
            message: self.message.clone(),
        }
    }
}

/// What to do with the dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogMode {
    /// OK / Leave
    #[default]
    Accept,
    /// Cancel / Stay
    Dismiss,
}

/// Which tier of the interceptor resolved the dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionTier {
    /// Observed by polling within the detect budget
    Primary,
    /// Handled blind after the fixed fallback delay
    Fallback,
}

/// Outcome of [`DialogInterceptor::resolve`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DialogResolution {
    /// Dialog was found and resolved
    Handled {
        /// The dialog as reported by the driver
        dialog: Dialog,
        /// Text typed into a prompt before resolving
        input_sent: Option<String>,
        /// Accepted (`true`) or dismissed
        accepted: bool,
        /// Tier that resolved it
        tier: DetectionTier,
    },
    /// No dialog appeared, even after the fallback delay
    Absent,
    /// A dialog could not be resolved
    Failed {
        /// Underlying error
        cause: String,
    },
}

impl DialogResolution {
    /// Convert `Failed` into a `DialogHandlingFailure` error
    pub fn into_result(self) -> VigilResult<Self> {
        match self {
            Self::Failed { cause } => Err(VigilError::DialogHandlingFailure { message: cause }),
            other => Ok(other),
        }
    }
}

/// Interceptor timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogInterceptorConfig {
    /// Primary-tier budget used when the caller passes none
    pub detect_timeout_ms: u64,
    /// Fixed pause before the blind fallback attempt
    pub fallback_delay_ms: u64,
    /// Primary-tier poll interval
    pub poll_interval_ms: u64,
}

impl Default for DialogInterceptorConfig {
    fn default() -> Self {
        Self {
            detect_timeout_ms: 1_000,
            fallback_delay_ms: 1_500,
            poll_interval_ms: crate::wait::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl DialogInterceptorConfig {
    /// Set the primary detect budget
    #[must_use]
    pub const fn with_detect_timeout(mut self, ms: u64) -> Self {
        self.detect_timeout_ms = ms;
        self
    }

    /// Set the fallback delay
    #[must_use]
    pub const fn with_fallback_delay(mut self, ms: u64) -> Self {
        self.fallback_delay_ms = ms;
        self
    }

    /// Set the primary poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Default detect budget
    #[must_use]
    pub const fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }
}

/// Two-tier dialog resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct DialogInterceptor {
    config: DialogInterceptorConfig,
}

impl DialogInterceptor {
    /// Create an interceptor
    #[must_use]
    pub const fn new(config: DialogInterceptorConfig) -> Self {
        Self { config }
    }

    /// Interceptor timing
    #[must_use]
    pub const fn config(&self) -> &DialogInterceptorConfig {
        &self.config
    }

    /// Resolve the dialog raised by the preceding action.
    ///
    /// `input` is typed into prompt dialogs only. `budget` bounds the primary
    /// tier; the fallback delay comes on top of it.
    pub fn resolve(
        &self,
        driver: &mut dyn BrowserDriver,
        mode: DialogMode,
        input: Option<&str>,
        budget: Duration,
    ) -> DialogResolution {
        let options = WaitOptions::new()
            .with_timeout(u64::try_from(budget.as_millis()).unwrap_or(u64::MAX))
            .with_poll_interval(self.config.poll_interval_ms);

        match Waiter::new().wait_for(&*driver, &Condition::DialogPresent, &options) {
            Ok(outcome) if outcome.is_satisfied() => {
                debug!(elapsed_ms = outcome.elapsed().as_millis() as u64, "dialog detected");
                let resolution = match finish(driver, mode, input, DetectionTier::Primary) {
                    Ok(handled) => handled,
                    Err(e) => DialogResolution::Failed {
                        cause: e.to_string(),
                    },
                };
                log_resolution(&resolution);
                resolution
            }
            Ok(_) => {
                debug!(
                    fallback_delay_ms = self.config.fallback_delay_ms,
                    "dialog not observed, falling back"
                );
                std::thread::sleep(Duration::from_millis(self.config.fallback_delay_ms));
                let resolution = match finish(driver, mode, input, DetectionTier::Fallback) {
                    Ok(handled) => handled,
                    Err(VigilError::NoDialog) => DialogResolution::Absent,
                    Err(e) => DialogResolution::Failed {
                        cause: e.to_string(),
                    },
                };
                log_resolution(&resolution);
                resolution
            }
            // Detection itself broke: no point in a blind attempt.
            Err(e) => {
                let resolution = DialogResolution::Failed {
                    cause: e.to_string(),
                };
                log_resolution(&resolution);
                resolution
            }
        }
    }

    /// [`resolve`](Self::resolve) with the configured detect budget
    pub fn resolve_default(
        &self,
        driver: &mut dyn BrowserDriver,
        mode: DialogMode,
        input: Option<&str>,
    ) -> DialogResolution {
        self.resolve(driver, mode, input, self.config.detect_timeout())
    }
}

fn finish(
    driver: &mut dyn BrowserDriver,
    mode: DialogMode,
    input: Option<&str>,
    tier: DetectionTier,
) -> VigilResult<DialogResolution> {
    let observed = driver.active_dialog().ok().flatten();
    let is_prompt = observed
        .as_ref()
        .map_or(true, |d| d.dialog_type() == DialogType::Prompt);

    let mut input_sent = None;
    if let Some(text) = input {
        if is_prompt {
            driver.send_dialog_text(text)?;
            input_sent = Some(text.to_string());
        }
    }

    let dialog = match mode {
        DialogMode::Accept => driver.accept_dialog()?,
        DialogMode::Dismiss => driver.dismiss_dialog()?,
    };
    Ok(DialogResolution::Handled {
        dialog,
        input_sent,
        accepted: mode == DialogMode::Accept,
        tier,
    })
}

fn log_resolution(resolution: &DialogResolution) {
    match resolution {
        DialogResolution::Handled {
            dialog,
            accepted,
            tier,
            ..
        } => info!(
            kind = %dialog.dialog_type(),
            message = dialog.message(),
            accepted,
            tier = ?tier,
            "dialog handled"
        ),
        DialogResolution::Absent => debug!("no dialog appeared"),
        DialogResolution::Failed { cause } => warn!(cause = %cause, "dialog handling failed"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::TodoAppDriver;
    use std::time::Instant;

    fn fast_interceptor() -> DialogInterceptor {
        DialogInterceptor::new(
            DialogInterceptorConfig::default()
                .with_detect_timeout(100)
                .with_fallback_delay(150)
                .with_poll_interval(10),
        )
    }

    mod dialog_tests {
        use super::*;

        #[test]
        fn test_dialog_constructors() {
            let alert = Dialog::alert("Login failed");
            assert_eq!(alert.dialog_type(), DialogType::Alert);
            assert_eq!(alert.message(), "Login failed");
            assert!(alert.default_value().is_none());

            let prompt = Dialog::prompt("Edit item:", Some("Milk".into()));
            assert_eq!(prompt.dialog_type(), DialogType::Prompt);
            assert_eq!(prompt.default_value(), Some("Milk"));
        }

        #[test]
        fn test_dialog_type_from_protocol() {
            assert_eq!(DialogType::from_protocol("prompt"), DialogType::Prompt);
            assert_eq!(DialogType::from_protocol("confirm"), DialogType::Confirm);
            assert_eq!(DialogType::from_protocol("beforeunload"), DialogType::BeforeUnload);
            assert_eq!(DialogType::from_protocol("alert"), DialogType::Alert);
        }

        #[test]
        fn test_blocking_error() {
            let err = Dialog::confirm("Sure?").blocking_error();
            assert!(matches!(err, VigilError::UnexpectedDialog { ref kind, .. } if kind == "confirm"));
        }
    }

    mod resolution_tests {
        use super::*;

        #[test]
        fn test_into_result() {
            assert!(DialogResolution::Absent.into_result().is_ok());
            let err = DialogResolution::Failed {
                cause: "boom".into(),
            }
            .into_result()
            .unwrap_err();
            assert!(matches!(err, VigilError::DialogHandlingFailure { .. }));
        }

        #[test]
        fn test_serializes_with_outcome_tag() {
            let json = serde_json::to_string(&DialogResolution::Absent).unwrap();
            assert_eq!(json, r#"{"outcome":"absent"}"#);
        }
    }

    mod interceptor_tests {
        use super::*;

        #[test]
        fn test_detectable_dialog_skips_fallback_delay() {
            let mut driver = TodoAppDriver::new();
            driver.login_now("wrong", "wrong");
            let start = Instant::now();
            let resolution = fast_interceptor().resolve(
                &mut driver,
                DialogMode::Accept,
                None,
                Duration::from_millis(100),
            );
            match resolution {
                DialogResolution::Handled { dialog, tier, accepted, .. } => {
                    assert_eq!(dialog.message(), "Login failed");
                    assert_eq!(tier, DetectionTier::Primary);
                    assert!(accepted);
                }
                other => panic!("expected Handled, got {other:?}"),
            }
            assert!(start.elapsed() < Duration::from_millis(150));
        }

        #[test]
        fn test_no_dialog_is_absent() {
            let mut driver = TodoAppDriver::new();
            let start = Instant::now();
            let resolution = fast_interceptor().resolve(
                &mut driver,
                DialogMode::Accept,
                None,
                Duration::from_millis(100),
            );
            assert_eq!(resolution, DialogResolution::Absent);
            assert!(start.elapsed() >= Duration::from_millis(250));
        }

        #[test]
        fn test_default_budget_is_configured_detect_timeout() {
            let mut driver = TodoAppDriver::new().with_dialog_delay(Duration::from_millis(40));
            driver.login_now("wrong", "wrong");
            match fast_interceptor().resolve_default(&mut driver, DialogMode::Accept, None) {
                DialogResolution::Handled { tier, .. } => assert_eq!(tier, DetectionTier::Primary),
                other => panic!("expected Handled, got {other:?}"),
            }

            let mut quiet = TodoAppDriver::new();
            let start = Instant::now();
            let resolution = fast_interceptor().resolve_default(&mut quiet, DialogMode::Accept, None);
            assert_eq!(resolution, DialogResolution::Absent);
            assert!(start.elapsed() >= Duration::from_millis(250));
        }

        #[test]
        fn test_dialog_visible_only_after_fallback_delay_is_handled() {
            let mut driver = TodoAppDriver::new().with_dialog_delay(Duration::from_millis(180));
            driver.login_now("wrong", "wrong");
            let resolution = fast_interceptor().resolve(
                &mut driver,
                DialogMode::Accept,
                None,
                Duration::from_millis(100),
            );
            match resolution {
                DialogResolution::Handled { tier, .. } => assert_eq!(tier, DetectionTier::Fallback),
                other => panic!("expected Handled, got {other:?}"),
            }
        }

        #[test]
        fn test_unobservable_dialog_is_handled_by_fallback() {
            let mut driver = TodoAppDriver::new().with_dialog_observable(false);
            driver.login_now("wrong", "wrong");
            let resolution = fast_interceptor().resolve(
                &mut driver,
                DialogMode::Dismiss,
                None,
                Duration::from_millis(50),
            );
            match resolution {
                DialogResolution::Handled { tier, accepted, .. } => {
                    assert_eq!(tier, DetectionTier::Fallback);
                    assert!(!accepted);
                }
                other => panic!("expected Handled, got {other:?}"),
            }
            assert!(driver.active_dialog_unchecked().is_none());
        }

        #[test]
        fn test_prompt_receives_input_text() {
            let mut driver = TodoAppDriver::logged_in_with_items(&["Test Item"]);
            driver.click_edit_now("Test Item");
            let resolution = fast_interceptor().resolve(
                &mut driver,
                DialogMode::Accept,
                Some("Test Item Updated"),
                Duration::from_millis(200),
            );
            match resolution {
                DialogResolution::Handled { dialog, input_sent, .. } => {
                    assert_eq!(dialog.dialog_type(), DialogType::Prompt);
                    assert_eq!(input_sent.as_deref(), Some("Test Item Updated"));
                }
                other => panic!("expected Handled, got {other:?}"),
            }
            assert!(driver.page_text().unwrap().contains("Test Item Updated"));
        }

        #[test]
        fn test_driver_failure_during_direct_attempt_is_failed() {
            let mut driver = TodoAppDriver::new().with_dialog_observable(false);
            driver.login_now("wrong", "wrong");
            driver.fail_dialog_commands("target crashed");
            let resolution = fast_interceptor().resolve(
                &mut driver,
                DialogMode::Accept,
                None,
                Duration::from_millis(20),
            );
            match resolution {
                DialogResolution::Failed { cause } => assert!(cause.contains("target crashed")),
                other => panic!("expected Failed, got {other:?}"),
            }
        }
    }
}
