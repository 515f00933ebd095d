//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Vigil library error
    #[error("Vigil error: {0}")]
    Vigil(#[from] vigil::VigilError),

    /// Scenario aborted or had failing steps
    #[error("Scenario '{scenario}' failed: {message}")]
    ScenarioFailed {
        /// Scenario name
        scenario: String,
        /// Summary of the failure
        message: String,
    },

    /// Screenshots differ
    #[error("Comparison failed: {message}")]
    ComparisonFailed {
        /// Comparison result
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a scenario failure
    #[must_use]
    pub fn scenario_failed(scenario: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScenarioFailed {
            scenario: scenario.into(),
            message: message.into(),
        }
    }

    /// Create a comparison failure
    #[must_use]
    pub fn comparison_failed(message: impl Into<String>) -> Self {
        Self::ComparisonFailed {
            message: message.into(),
        }
    }

    /// Whether the error reports a regression rather than a usage problem
    #[must_use]
    pub const fn is_regression(&self) -> bool {
        matches!(self, Self::ScenarioFailed { .. } | Self::ComparisonFailed { .. })
    }
}
