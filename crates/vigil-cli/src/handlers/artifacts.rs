//! `vigil artifacts`: list screenshots in an artifact directory

use crate::commands::ArtifactsArgs;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Reporter};
use std::path::Path;
use vigil::{list_artifacts, ArtifactEntry};

/// Text listing: one `size  name` line per artifact
#[must_use]
pub fn render_artifacts(dir: &Path, entries: &[ArtifactEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec![format!("No artifacts in {}", dir.display())];
    }
    let mut lines: Vec<String> = entries
        .iter()
        .map(|e| format!("{:>10}  {}", e.size, e.name))
        .collect();
    let total: u64 = entries.iter().map(|e| e.size).sum();
    lines.push(format!(
        "{} artifact(s), {} bytes in {}",
        entries.len(),
        total,
        dir.display()
    ));
    lines
}

/// Execute the artifacts command
pub fn execute_artifacts(args: &ArtifactsArgs, reporter: &Reporter) -> CliResult<()> {
    if args.dir.is_file() {
        return Err(CliError::invalid_argument(format!(
            "{} is a file, not an artifact directory",
            args.dir.display()
        )));
    }
    let entries = list_artifacts(&args.dir)?;
    match OutputFormat::from(args.format) {
        OutputFormat::Json => reporter.line(&serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for line in render_artifacts(&args.dir, &entries) {
                reporter.line(&line);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::FormatArg;
    use std::path::PathBuf;

    #[test]
    fn test_render_empty() {
        assert_eq!(
            render_artifacts(Path::new("shots"), &[]),
            ["No artifacts in shots"]
        );
    }

    #[test]
    fn test_render_entries() {
        let entries = vec![
            ArtifactEntry {
                name: "login_20260101_120000_000.png".into(),
                path: PathBuf::from("shots/login_20260101_120000_000.png"),
                size: 1200,
            },
            ArtifactEntry {
                name: "todo_20260101_120001_000.png".into(),
                path: PathBuf::from("shots/todo_20260101_120001_000.png"),
                size: 800,
            },
        ];
        let lines = render_artifacts(Path::new("shots"), &entries);
        assert_eq!(lines[0], "      1200  login_20260101_120000_000.png");
        assert_eq!(lines[2], "2 artifact(s), 2000 bytes in shots");
    }

    #[test]
    fn test_file_instead_of_directory_is_invalid_argument() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("shot.png");
        std::fs::write(&file, b"png").unwrap();
        let args = ArtifactsArgs {
            dir: file,
            format: FormatArg::Text,
        };
        let err = execute_artifacts(&args, &Reporter::new(false, true)).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { .. }));
        assert!(err.to_string().contains("not an artifact directory"));
    }
}
