//! Vigil CLI Library
//!
//! Command-line interface for the Vigil regression harness.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    ArtifactsArgs, Cli, ColorArg, Commands, CompareArgs, FormatArg, RunArgs, ScenarioArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, Reporter};
