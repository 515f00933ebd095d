//! `vigil compare`: pixel-exact comparison of two images

use crate::commands::CompareArgs;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Reporter};
use vigil::{ComparatorConfig, ComparisonResult, VisualComparator};

/// Compare the two images named in `args`
pub fn compare_files(args: &CompareArgs) -> ComparisonResult {
    VisualComparator::new(ComparatorConfig::default().with_channel_tolerance(args.tolerance))
        .compare(&args.baseline, &args.actual)
}

/// Execute the compare command
pub fn execute_compare(args: &CompareArgs, reporter: &Reporter) -> CliResult<()> {
    let result = compare_files(args);
    match OutputFormat::from(args.format) {
        OutputFormat::Json => reporter.line(&serde_json::to_string_pretty(&result)?),
        OutputFormat::Text if result.is_match() => reporter.success(&result.to_string()),
        OutputFormat::Text => reporter.failure(&result.to_string()),
    }
    if result.is_match() {
        Ok(())
    } else {
        Err(CliError::comparison_failed(result.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::FormatArg;
    use image::{Rgba, RgbaImage};
    use std::path::Path;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, tweak: Option<(u32, u32, Rgba<u8>)>) -> std::path::PathBuf {
        let mut img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        if let Some((x, y, px)) = tweak {
            img.put_pixel(x, y, px);
        }
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    fn args(baseline: std::path::PathBuf, actual: std::path::PathBuf, tolerance: u8) -> CompareArgs {
        CompareArgs {
            baseline,
            actual,
            tolerance,
            format: FormatArg::Text,
        }
    }

    #[test]
    fn test_identical_images_match() {
        let dir = TempDir::new().unwrap();
        let a = write_png(dir.path(), "a.png", None);
        let b = write_png(dir.path(), "b.png", None);
        assert!(execute_compare(&args(a, b, 0), &Reporter::new(false, true)).is_ok());
    }

    #[test]
    fn test_tolerance_is_applied() {
        let dir = TempDir::new().unwrap();
        let a = write_png(dir.path(), "a.png", None);
        let b = write_png(dir.path(), "b.png", Some((2, 1, Rgba([12, 20, 30, 255]))));
        assert!(!compare_files(&args(a.clone(), b.clone(), 0)).is_match());
        assert!(compare_files(&args(a, b, 2)).is_match());
    }

    #[test]
    fn test_mismatch_is_a_regression() {
        let dir = TempDir::new().unwrap();
        let a = write_png(dir.path(), "a.png", None);
        let b = write_png(dir.path(), "b.png", Some((1, 0, Rgba([0, 0, 0, 255]))));
        let err = execute_compare(&args(a, b, 0), &Reporter::new(false, true)).unwrap_err();
        assert!(err.is_regression());
        assert!(err.to_string().contains("pixel mismatch at (1, 0)"));
    }
}
