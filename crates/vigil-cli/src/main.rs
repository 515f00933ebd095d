//! Vigil CLI: browser UI regression harness
//!
//! ## Usage
//!
//! ```bash
//! vigil run --url http://localhost:3000          # Run the built-in todo scenario
//! vigil run --scenario flows/login.yaml --headed  # Run a scenario file
//! vigil compare baseline.png actual.png          # Pixel-exact comparison
//! vigil artifacts target/screenshots              # List captured screenshots
//! ```

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vigil_cli::handlers::{execute_artifacts, execute_compare, execute_run, execute_scenario};
use vigil_cli::{Cli, CliConfig, CliResult, ColorChoice, Commands, Reporter, Verbosity};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: CliConfig) -> CliResult<()> {
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    match cli.command {
        Commands::Run(args) => execute_run(&args, &reporter),
        Commands::Compare(args) => execute_compare(&args, &reporter),
        Commands::Artifacts(args) => execute_artifacts(&args, &reporter),
        Commands::Scenario(args) => execute_scenario(&args, &reporter),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.verbose, cli.quiet))
        .with_color(color)
}

/// Logs go to stderr; `RUST_LOG` wins over the `-v`/`-q` flags
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    // Fails only if a global subscriber is already installed; keep that one.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok();
}
