//! Scenario orchestration.
//!
//! - [`step`]: the step list data model (YAML-serializable)
//! - [`runner`]: the state machine that executes it against a [`Session`](crate::Session)
//! - [`report`]: the per-step outcome log

pub mod report;
pub mod runner;
pub mod step;

pub use report::{RunState, ScenarioReport, StepOutcome, StepStatus, WaitRecord};
pub use runner::{CaptureDensity, RunConfig, ScenarioRunner};
pub use step::{FailurePolicy, Scenario, Step, StepKind, Target};
