//! Screenshot capture.
//!
//! Writes `{dir}/{step}_{yyyyMMdd_HHmmss_SSS}.png`. Every call claims a fresh
//! file with create-new semantics, so two captures of the same step inside one
//! millisecond (or two runs sharing a directory) never overwrite each other.
//!
//! Full-page mode scrolls one viewport at a time and pastes the tiles into a
//! single image sized to the document.

use crate::driver::{BrowserDriver, PageMetrics};
use crate::result::{VigilError, VigilResult};
use chrono::{DateTime, Local};
use image::{ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default artifact directory
pub const DEFAULT_ARTIFACT_DIR: &str = "target/screenshots";

/// Viewport or whole document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// What is currently visible
    #[default]
    Viewport,
    /// Entire scrollable content, stitched from viewport tiles
    FullPage,
}

/// A stored screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    /// Step that produced it
    pub step_name: String,
    /// Wall-clock capture time
    pub captured_at: DateTime<Local>,
    /// File location
    pub path: PathBuf,
    /// Image width in device pixels
    pub width: u32,
    /// Image height in device pixels
    pub height: u32,
    /// Capture mode
    pub mode: CaptureMode,
}

/// Capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory artifacts are written to
    pub artifact_dir: PathBuf,
    /// Pause after each scroll while stitching
    pub stitch_settle_ms: u64,
    /// Upper bound on stitched tiles
    pub max_tiles: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            stitch_settle_ms: 1_000,
            max_tiles: 50,
        }
    }
}

impl CaptureConfig {
    /// Config writing to `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Set the stitch settle pause
    #[must_use]
    pub const fn with_stitch_settle(mut self, ms: u64) -> Self {
        self.stitch_settle_ms = ms;
        self
    }

    /// Set the tile limit
    #[must_use]
    pub const fn with_max_tiles(mut self, tiles: u32) -> Self {
        self.max_tiles = tiles;
        self
    }
}

/// Screenshot writer
#[derive(Debug, Clone, Default)]
pub struct ScreenshotCapture {
    config: CaptureConfig,
}

impl ScreenshotCapture {
    /// Create a capturer
    #[must_use]
    pub const fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Capture settings
    #[must_use]
    pub const fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Capture and store a screenshot for `step_name`.
    ///
    /// Any driver, decode or I/O problem is reported as `CaptureFailure`.
    pub fn capture(
        &self,
        driver: &mut dyn BrowserDriver,
        step_name: &str,
        mode: CaptureMode,
    ) -> VigilResult<ScreenshotArtifact> {
        let failure = |e: VigilError| VigilError::CaptureFailure {
            step: step_name.to_string(),
            message: e.to_string(),
        };

        let png = match mode {
            CaptureMode::Viewport => driver.screenshot_png().map_err(failure)?,
            CaptureMode::FullPage => self.stitch(driver).map_err(failure)?,
        };
        let (width, height) = png_dimensions(&png).map_err(failure)?;

        let captured_at = Local::now();
        let path = self
            .write_unique(step_name, &captured_at, &png)
            .map_err(failure)?;
        info!(step = step_name, path = %path.display(), width, height, "screenshot saved");

        Ok(ScreenshotArtifact {
            step_name: step_name.to_string(),
            captured_at,
            path,
            width,
            height,
            mode,
        })
    }

    fn stitch(&self, driver: &mut dyn BrowserDriver) -> VigilResult<Vec<u8>> {
        let metrics = driver.page_metrics()?;
        if metrics.fits_viewport() || metrics.viewport_height == 0 {
            return driver.screenshot_png();
        }

        let original_scroll = metrics.scroll_y;
        let covered = metrics
            .content_height
            .min(metrics.viewport_height.saturating_mul(self.config.max_tiles.max(1)));

        let tiles = self.paste_tiles(driver, &metrics, covered);
        let restored = driver.scroll_to(original_scroll);
        let canvas = tiles?;
        restored?;

        match canvas {
            Some(stitched) => encode_png(&stitched),
            None => driver.screenshot_png(),
        }
    }

    /// Scroll through the first `covered` pixels and paste each tile at the
    /// offset actually reached. Leaves the page scrolled.
    fn paste_tiles(
        &self,
        driver: &mut dyn BrowserDriver,
        metrics: &PageMetrics,
        covered: u32,
    ) -> VigilResult<Option<RgbaImage>> {
        let settle = Duration::from_millis(self.config.stitch_settle_ms);
        let mut canvas: Option<(RgbaImage, f64)> = None;
        let mut offset = 0;
        while offset < covered {
            let reached = driver.scroll_to(offset)?;
            std::thread::sleep(settle);
            let tile = image::load_from_memory(&driver.screenshot_png()?)?.to_rgba8();

            let (target, scale) = canvas.get_or_insert_with(|| {
                let scale = f64::from(tile.width()) / f64::from(metrics.viewport_width.max(1));
                let height = (f64::from(covered) * scale).round() as u32;
                (RgbaImage::new(tile.width(), height), scale)
            });
            let y = (f64::from(reached) * *scale).round() as i64;
            image::imageops::replace(target, &tile, 0, y);
            debug!(offset, reached, "stitched tile");

            offset += metrics.viewport_height;
        }
        Ok(canvas.map(|(stitched, _)| stitched))
    }

    fn write_unique(
        &self,
        step_name: &str,
        captured_at: &DateTime<Local>,
        png: &[u8],
    ) -> VigilResult<PathBuf> {
        fs::create_dir_all(&self.config.artifact_dir)?;
        let stem = format!(
            "{}_{}",
            sanitize_step_name(step_name),
            captured_at.format("%Y%m%d_%H%M%S_%3f")
        );

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.png")
            } else {
                format!("{stem}_{attempt}.png")
            };
            let path = self.config.artifact_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    fill_new_file(&path, file, png)?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Write `png` into the file just created at `path`; a partial file is removed
fn fill_new_file(path: &Path, mut file: impl Write, png: &[u8]) -> VigilResult<()> {
    if let Err(e) = file.write_all(png).and_then(|()| file.flush()) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %cleanup, "partial artifact left behind");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Make a step name safe for a file name
#[must_use]
pub fn sanitize_step_name(step_name: &str) -> String {
    let cleaned: String = step_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned
    }
}

/// Encode an RGBA image as PNG
pub fn encode_png(image: &RgbaImage) -> VigilResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(buffer)
}

fn png_dimensions(png: &[u8]) -> VigilResult<(u32, u32)> {
    let img = image::load_from_memory(png)?;
    Ok((img.width(), img.height()))
}

/// A PNG file found in an artifact directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    /// File name
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// PNG artifacts in `dir`, sorted by name. A missing directory is empty.
pub fn list_artifacts(dir: &Path) -> VigilResult<Vec<ArtifactEntry>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png || !entry.file_type()?.is_file() {
            continue;
        }
        entries.push(ArtifactEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: entry.metadata()?.len(),
            path,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
