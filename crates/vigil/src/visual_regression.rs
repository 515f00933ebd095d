//! Visual regression: pixel-exact image comparison and the baseline store.
//!
//! Mismatches are results, not errors. Only a baseline store I/O problem is an
//! `Err`; an undecodable image is the `DecodeFailure` outcome.

use crate::capture::ScreenshotArtifact;
use crate::result::VigilResult;
use image::{DynamicImage, GenericImageView, Rgba};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default baseline directory
pub const DEFAULT_BASELINE_DIR: &str = "tests/baselines";

/// Image size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// RGBA color of one pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelColor {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha
    pub a: u8,
}

impl From<Rgba<u8>> for PixelColor {
    fn from(px: Rgba<u8>) -> Self {
        let [r, g, b, a] = px.0;
        Self { r, g, b, a }
    }
}

impl std::fmt::Display for PixelColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Outcome of comparing two images
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ComparisonResult {
    /// Same size, every pixel equal (within tolerance)
    Match,
    /// Sizes differ; no pixels were compared
    DimensionMismatch {
        /// Baseline size
        expected: Dimensions,
        /// Actual size
        actual: Dimensions,
    },
    /// First differing pixel in row-major order
    PixelMismatch {
        /// Column
        x: u32,
        /// Row
        y: u32,
        /// Baseline color
        expected: PixelColor,
        /// Actual color
        actual: PixelColor,
    },
    /// One of the images could not be read
    DecodeFailure {
        /// Offending file
        path: PathBuf,
        /// Decoder message
        message: String,
    },
}

impl ComparisonResult {
    /// Whether the images matched
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

impl std::fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "dimension mismatch: expected {}x{}, got {}x{}",
                expected.width, expected.height, actual.width, actual.height
            ),
            Self::PixelMismatch {
                x,
                y,
                expected,
                actual,
            } => write!(
                f,
                "pixel mismatch at ({x}, {y}): expected {expected}, got {actual}"
            ),
            Self::DecodeFailure { path, message } => {
                write!(f, "cannot decode {}: {message}", path.display())
            }
        }
    }
}

/// Comparator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Largest per-channel difference still counted as equal (0 = exact)
    pub channel_tolerance: u8,
}

impl ComparatorConfig {
    /// Set the channel tolerance
    #[must_use]
    pub const fn with_channel_tolerance(mut self, tolerance: u8) -> Self {
        self.channel_tolerance = tolerance;
        self
    }
}

/// Pixel comparator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualComparator {
    config: ComparatorConfig,
}

impl VisualComparator {
    /// Create a comparator
    #[must_use]
    pub const fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Comparator settings
    #[must_use]
    pub const fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Compare the image at `actual` against the one at `baseline`
    pub fn compare(&self, baseline: &Path, actual: &Path) -> ComparisonResult {
        let expected = match load(baseline) {
            Ok(img) => img,
            Err(failure) => return failure,
        };
        let actual = match load(actual) {
            Ok(img) => img,
            Err(failure) => return failure,
        };
        self.compare_images(&expected, &actual)
    }

    /// Compare two decoded images
    pub fn compare_images(&self, expected: &DynamicImage, actual: &DynamicImage) -> ComparisonResult {
        let (ew, eh) = expected.dimensions();
        let (aw, ah) = actual.dimensions();
        if (ew, eh) != (aw, ah) {
            return ComparisonResult::DimensionMismatch {
                expected: Dimensions {
                    width: ew,
                    height: eh,
                },
                actual: Dimensions {
                    width: aw,
                    height: ah,
                },
            };
        }

        let expected = expected.to_rgba8();
        let actual = actual.to_rgba8();
        for y in 0..eh {
            for x in 0..ew {
                let e = *expected.get_pixel(x, y);
                let a = *actual.get_pixel(x, y);
                if !self.pixels_equal(e, a) {
                    return ComparisonResult::PixelMismatch {
                        x,
                        y,
                        expected: e.into(),
                        actual: a.into(),
                    };
                }
            }
        }
        ComparisonResult::Match
    }

    fn pixels_equal(&self, a: Rgba<u8>, b: Rgba<u8>) -> bool {
        a.0.iter()
            .zip(b.0.iter())
            .all(|(x, y)| x.abs_diff(*y) <= self.config.channel_tolerance)
    }
}

fn load(path: &Path) -> Result<DynamicImage, ComparisonResult> {
    image::open(path).map_err(|e| ComparisonResult::DecodeFailure {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Outcome of checking an artifact against its stored baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum BaselineCheck {
    /// Baseline existed and was compared
    Compared {
        /// Baseline file
        baseline: PathBuf,
        /// Comparison outcome
        result: ComparisonResult,
    },
    /// No baseline existed; the artifact was stored as the new one
    Recorded {
        /// Baseline file written
        baseline: PathBuf,
    },
    /// No baseline existed and recording is off
    Missing {
        /// Expected baseline file
        baseline: PathBuf,
    },
}

impl BaselineCheck {
    /// Whether this counts as passing
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        match self {
            Self::Compared { result, .. } => result.is_match(),
            Self::Recorded { .. } => true,
            Self::Missing { .. } => false,
        }
    }
}

impl std::fmt::Display for BaselineCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compared { result, .. } => write!(f, "{result}"),
            Self::Recorded { baseline } => write!(f, "baseline recorded at {}", baseline.display()),
            Self::Missing { baseline } => write!(f, "baseline missing: {}", baseline.display()),
        }
    }
}

/// Directory of `{name}.png` reference images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineStore {
    /// Baseline directory
    pub dir: PathBuf,
    /// Record missing baselines from the actual artifact
    pub update_missing: bool,
    /// Comparator used for existing baselines
    #[serde(skip)]
    comparator: VisualComparator,
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_DIR)
    }
}

impl BaselineStore {
    /// Store rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            update_missing: false,
            comparator: VisualComparator::default(),
        }
    }

    /// Record missing baselines instead of reporting them
    #[must_use]
    pub const fn with_update_missing(mut self, update: bool) -> Self {
        self.update_missing = update;
        self
    }

    /// Use a specific comparator
    #[must_use]
    pub const fn with_comparator(mut self, comparator: VisualComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Path of the baseline for `name`
    #[must_use]
    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.png", crate::capture::sanitize_step_name(name)))
    }

    /// Compare `artifact` against baseline `name`
    pub fn check(&self, name: &str, artifact: &ScreenshotArtifact) -> VigilResult<BaselineCheck> {
        let baseline = self.baseline_path(name);
        if baseline.exists() {
            let result = self.comparator.compare(&baseline, &artifact.path);
            debug!(name, result = %result, "baseline compared");
            return Ok(BaselineCheck::Compared { baseline, result });
        }
        if self.update_missing {
            fs::create_dir_all(&self.dir)?;
            fs::copy(&artifact.path, &baseline)?;
            info!(name, path = %baseline.display(), "baseline recorded");
            return Ok(BaselineCheck::Recorded { baseline });
        }
        Ok(BaselineCheck::Missing { baseline })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capture::{encode_png, CaptureMode};
    use image::RgbaImage;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    fn write(dir: &TempDir, name: &str, img: &RgbaImage) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, encode_png(img).unwrap()).unwrap();
        path
    }

    fn artifact(path: PathBuf, img: &RgbaImage) -> ScreenshotArtifact {
        ScreenshotArtifact {
            step_name: "checkpoint".into(),
            captured_at: chrono::Local::now(),
            path,
            width: img.width(),
            height: img.height(),
            mode: CaptureMode::FullPage,
        }
    }

    mod comparator_tests {
        use super::*;

        #[test]
        fn test_same_file_matches() {
            let dir = TempDir::new().unwrap();
            let path = write(&dir, "a.png", &solid(4, 3, [10, 20, 30, 255]));
            assert_eq!(
                VisualComparator::default().compare(&path, &path),
                ComparisonResult::Match
            );
        }

        #[test]
        fn test_dimension_mismatch_short_circuits() {
            let dir = TempDir::new().unwrap();
            let a = write(&dir, "a.png", &solid(4, 3, [0, 0, 0, 255]));
            let b = write(&dir, "b.png", &solid(3, 4, [0, 0, 0, 255]));
            match VisualComparator::default().compare(&a, &b) {
                ComparisonResult::DimensionMismatch { expected, actual } => {
                    assert_eq!((expected.width, expected.height), (4, 3));
                    assert_eq!((actual.width, actual.height), (3, 4));
                }
                other => panic!("expected DimensionMismatch, got {other:?}"),
            }
        }

        #[test]
        fn test_first_difference_in_row_major_order() {
            let dir = TempDir::new().unwrap();
            let base = solid(5, 5, [255, 255, 255, 255]);
            let mut changed = base.clone();
            changed.put_pixel(4, 1, Rgba([255, 0, 0, 255]));
            changed.put_pixel(0, 3, Rgba([0, 255, 0, 255]));
            let a = write(&dir, "a.png", &base);
            let b = write(&dir, "b.png", &changed);

            match VisualComparator::default().compare(&a, &b) {
                ComparisonResult::PixelMismatch {
                    x,
                    y,
                    expected,
                    actual,
                } => {
                    assert_eq!((x, y), (4, 1));
                    assert_eq!(expected.to_string(), "rgba(255, 255, 255, 255)");
                    assert_eq!(actual.to_string(), "rgba(255, 0, 0, 255)");
                }
                other => panic!("expected PixelMismatch, got {other:?}"),
            }
        }

        #[test]
        fn test_corrupt_file_is_decode_failure() {
            let dir = TempDir::new().unwrap();
            let good = write(&dir, "good.png", &solid(2, 2, [0, 0, 0, 255]));
            let bad = dir.path().join("bad.png");
            fs::write(&bad, b"not an image").unwrap();
            match VisualComparator::default().compare(&good, &bad) {
                ComparisonResult::DecodeFailure { path, .. } => assert_eq!(path, bad),
                other => panic!("expected DecodeFailure, got {other:?}"),
            }
            let missing = dir.path().join("missing.png");
            assert!(matches!(
                VisualComparator::default().compare(&missing, &good),
                ComparisonResult::DecodeFailure { .. }
            ));
        }

        #[test]
        fn test_channel_tolerance() {
            let a = DynamicImage::ImageRgba8(solid(2, 2, [100, 100, 100, 255]));
            let b = DynamicImage::ImageRgba8(solid(2, 2, [102, 99, 100, 255]));
            assert!(!VisualComparator::default().compare_images(&a, &b).is_match());
            let lenient =
                VisualComparator::new(ComparatorConfig::default().with_channel_tolerance(2));
            assert!(lenient.compare_images(&a, &b).is_match());
        }

        #[test]
        fn test_result_serializes_tagged() {
            let json = serde_json::to_value(ComparisonResult::Match).unwrap();
            assert_eq!(json["result"], "match");
        }
    }

    mod comparator_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn prop_comparison_is_reflexive(
                w in 1u32..16,
                h in 1u32..16,
                seed in any::<u8>(),
            ) {
                let img = RgbaImage::from_fn(w, h, |x, y| {
                    Rgba([seed ^ x as u8, seed.wrapping_add(y as u8), (x * y) as u8, 255])
                });
                let dynamic = DynamicImage::ImageRgba8(img);
                prop_assert_eq!(
                    VisualComparator::default().compare_images(&dynamic, &dynamic),
                    ComparisonResult::Match
                );
            }

            #[test]
            fn prop_single_pixel_change_is_located(
                w in 1u32..16,
                h in 1u32..16,
                px in 0u32..16,
                py in 0u32..16,
            ) {
                let (px, py) = (px % w, py % h);
                let base = solid(w, h, [40, 40, 40, 255]);
                let mut changed = base.clone();
                changed.put_pixel(px, py, Rgba([41, 40, 40, 255]));
                let result = VisualComparator::default().compare_images(
                    &DynamicImage::ImageRgba8(base),
                    &DynamicImage::ImageRgba8(changed),
                );
                match result {
                    ComparisonResult::PixelMismatch { x, y, .. } => {
                        prop_assert_eq!((x, y), (px, py));
                    }
                    other => prop_assert!(false, "expected PixelMismatch, got {:?}", other),
                }
            }
        }
    }

    mod baseline_store_tests {
        use super::*;

        #[test]
        fn test_missing_baseline_without_update() {
            let dir = TempDir::new().unwrap();
            let img = solid(3, 3, [1, 2, 3, 255]);
            let shot = artifact(write(&dir, "shot.png", &img), &img);
            let store = BaselineStore::new(dir.path().join("baselines"));
            let check = store.check("after login", &shot).unwrap();
            assert_eq!(
                check,
                BaselineCheck::Missing {
                    baseline: dir.path().join("baselines").join("after_login.png")
                }
            );
            assert!(!check.is_ok());
        }

        #[test]
        fn test_missing_baseline_is_recorded_then_compared() {
            let dir = TempDir::new().unwrap();
            let img = solid(3, 3, [1, 2, 3, 255]);
            let shot = artifact(write(&dir, "shot.png", &img), &img);
            let store = BaselineStore::new(dir.path().join("baselines")).with_update_missing(true);

            let first = store.check("todo", &shot).unwrap();
            assert!(matches!(first, BaselineCheck::Recorded { .. }));
            assert!(store.baseline_path("todo").exists());

            let second = store.check("todo", &shot).unwrap();
            assert!(matches!(
                second,
                BaselineCheck::Compared {
                    result: ComparisonResult::Match,
                    ..
                }
            ));
        }

        #[test]
        fn test_changed_artifact_is_reported() {
            let dir = TempDir::new().unwrap();
            let store = BaselineStore::new(dir.path());
            write(&dir, "todo.png", &solid(3, 3, [0, 0, 0, 255]));
            let img = solid(3, 3, [9, 9, 9, 255]);
            let shot = artifact(write(&dir, "shot.png", &img), &img);
            let check = store.check("todo", &shot).unwrap();
            assert!(!check.is_ok());
            assert!(check.to_string().starts_with("pixel mismatch at (0, 0)"));
        }

        #[test]
        fn test_check_json_shape() {
            let compared = BaselineCheck::Compared {
                baseline: PathBuf::from("baselines/todo.png"),
                result: ComparisonResult::Match,
            };
            let json = serde_json::to_value(&compared).unwrap();
            assert_eq!(json["check"], "compared");
            assert_eq!(json["baseline"], "baselines/todo.png");
            assert_eq!(json["result"]["result"], "match");

            let recorded = BaselineCheck::Recorded {
                baseline: PathBuf::from("baselines/login.png"),
            };
            let json = serde_json::to_value(&recorded).unwrap();
            assert_eq!(json["check"], "recorded");
            assert_eq!(json["baseline"], "baselines/login.png");
        }
    }
}
