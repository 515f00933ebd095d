//! Vigil: browser UI regression harness
//!
//! Drives a web application through a scripted scenario, waits explicitly for
//! every asynchronous UI change, resolves native dialogs, captures full-page
//! screenshots and compares them pixel by pixel against stored baselines.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      VIGIL Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Session    │    │ Browser    │            │
//! │   │ Runner     │───►│ Wait/Dialog│───►│ Driver     │            │
//! │   │            │    │ Capture    │    │ (chromium) │            │
//! │   └─────┬──────┘    └────────────┘    └────────────┘            │
//! │         │           ┌────────────┐                               │
//! │         └──────────►│ Visual     │  baseline PNG vs artifact     │
//! │                     │ Comparator │                               │
//! │                     └────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vigil::prelude::*;
//!
//! let driver = TodoAppDriver::new();
//! let session = Session::new(Box::new(driver), SessionConfig::default());
//! let scenario = todo_regression_scenario(&TodoScenarioConfig::default().without_baselines());
//! let report = ScenarioRunner::default().run(session, &scenario);
//! for line in report.summary_lines() {
//!     println!("{line}");
//! }
//! ```

#![warn(missing_docs)]

mod result;

/// Element locators
pub mod locator;

/// Browser driver boundary
pub mod driver;

/// Conditions evaluated against the page
pub mod condition;

/// Explicit waits
pub mod wait;

/// Native dialog interception
pub mod dialog;

/// Screenshot capture and full-page stitching
pub mod capture;

/// Pixel-exact screenshot comparison and baselines
pub mod visual_regression;

/// Browser session lifecycle
pub mod session;

/// Scenario definition, execution and reporting
pub mod scenario;

/// Harness configuration
pub mod config;

/// Scripted in-memory todo application
pub mod mock;

/// Todo-list regression scenario
pub mod todo;

/// Chromium driver (requires `browser` feature)
#[cfg(feature = "browser")]
pub mod cdp;

pub use capture::{
    list_artifacts, sanitize_step_name, ArtifactEntry, CaptureConfig, CaptureMode,
    ScreenshotArtifact, ScreenshotCapture,
};
pub use condition::{Condition, Probe};
pub use config::HarnessConfig;
pub use dialog::{
    DetectionTier, Dialog, DialogInterceptor, DialogInterceptorConfig, DialogMode,
    DialogResolution, DialogType,
};
pub use driver::{BrowserDriver, DriverConfig, ElementHandle, ElementState, PageMetrics};
pub use locator::{Locator, Strategy, TextMatch};
pub use result::{VigilError, VigilResult};
pub use scenario::{
    CaptureDensity, FailurePolicy, RunConfig, RunState, Scenario, ScenarioReport,
    ScenarioRunner, Step, StepKind, StepOutcome, StepStatus, Target,
};
pub use session::{Session, SessionConfig};
pub use visual_regression::{
    BaselineCheck, BaselineStore, ComparatorConfig, ComparisonResult, VisualComparator,
};
pub use wait::{wait_until, WaitOptions, WaitOutcome, Waiter};

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::capture::*;
    pub use super::condition::*;
    pub use super::config::*;
    pub use super::dialog::*;
    pub use super::driver::*;
    pub use super::locator::*;
    pub use super::mock::{AppObserver, TodoAppDriver};
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::session::*;
    pub use super::todo::*;
    pub use super::visual_regression::*;
    pub use super::wait::*;

    #[cfg(feature = "browser")]
    pub use super::cdp::ChromiumDriver;
}
