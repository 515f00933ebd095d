//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure helper functions
//! - Tests

pub mod artifacts;
pub mod compare;
pub mod run;
pub mod scenario;

pub use artifacts::{execute_artifacts, render_artifacts};
pub use compare::execute_compare;
pub use run::{check_report, execute_run, load_scenario, resolve_config, run_with_driver};
pub use scenario::{execute_scenario, render_scenario};
