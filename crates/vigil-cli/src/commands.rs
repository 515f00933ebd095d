//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vigil::capture::DEFAULT_ARTIFACT_DIR;

/// Vigil: browser UI regression harness
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a regression scenario against a live browser
    Run(RunArgs),

    /// Compare two screenshots pixel by pixel
    Compare(CompareArgs),

    /// List screenshot artifacts
    Artifacts(ArtifactsArgs),

    /// Print the built-in todo scenario as YAML
    Scenario(ScenarioArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Harness configuration file (YAML)
    #[arg(short, long, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Application base URL
    #[arg(long, env = "VIGIL_URL")]
    pub url: Option<String>,

    /// Scenario file (YAML); the built-in todo scenario when omitted
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Screenshot artifact directory
    #[arg(long, env = "VIGIL_ARTIFACT_DIR")]
    pub artifacts: Option<PathBuf>,

    /// Baseline directory
    #[arg(long, env = "VIGIL_BASELINE_DIR")]
    pub baselines: Option<PathBuf>,

    /// Record missing baselines from this run
    #[arg(long)]
    pub update_baselines: bool,

    /// Take a diagnostic screenshot after every step
    #[arg(long)]
    pub every_step: bool,

    /// Write the JSON run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Arguments for the compare command
#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Baseline image
    pub baseline: PathBuf,

    /// Actual image
    pub actual: PathBuf,

    /// Largest per-channel difference treated as equal
    #[arg(short, long, default_value = "0")]
    pub tolerance: u8,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the artifacts command
#[derive(Parser, Debug)]
pub struct ArtifactsArgs {
    /// Artifact directory
    #[arg(default_value = DEFAULT_ARTIFACT_DIR)]
    pub dir: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the scenario command
#[derive(Parser, Debug)]
pub struct ScenarioArgs {
    /// Leave out the baseline comparison steps
    #[arg(long)]
    pub no_baselines: bool,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Detect terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}
