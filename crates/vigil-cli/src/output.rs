//! Output formatting
//!
//! Results go to stdout; diagnostics go through `tracing` on stderr.

use console::{style, Style, Term};
use serde::{Deserialize, Serialize};
use vigil::{ScenarioReport, StepStatus};

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Writes command results
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    /// Print a raw line, even in quiet mode
    pub fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line(&styled);
    }

    /// Print the per-step log of a run
    pub fn report(&self, report: &ScenarioReport) {
        let lines = report.summary_lines();
        let Some((header, steps)) = lines.split_first() else {
            return;
        };
        self.header(header);
        for (outcome, line) in report.outcomes.iter().zip(steps) {
            if self.quiet && matches!(outcome.status, StepStatus::Passed | StepStatus::Skipped) {
                continue;
            }
            let _ = self.term.write_line(&self.paint(outcome.status, line));
        }
        for line in steps.iter().skip(report.outcomes.len()) {
            let _ = self.term.write_line(line);
        }
    }

    fn paint(&self, status: StepStatus, line: &str) -> String {
        if !self.use_color {
            return line.to_string();
        }
        let style = match status {
            StepStatus::Passed => Style::new().green(),
            StepStatus::Failed => Style::new().yellow(),
            StepStatus::Aborted => Style::new().red().bold(),
            StepStatus::Skipped => Style::new().dim(),
        };
        style.apply_to(line).to_string()
    }
}
