//! Harness configuration
//!
//! A single YAML document with one section per component. Every field has a
//! default, so an empty file is a valid configuration.

use crate::capture::{CaptureConfig, DEFAULT_ARTIFACT_DIR};
use crate::dialog::DialogInterceptorConfig;
use crate::driver::DriverConfig;
use crate::result::{VigilError, VigilResult};
use crate::scenario::{CaptureDensity, RunConfig};
use crate::session::{SessionConfig, DEFAULT_BASE_URL};
use crate::visual_regression::{BaselineStore, ComparatorConfig, VisualComparator, DEFAULT_BASELINE_DIR};
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Screenshot section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Artifact directory
    pub artifact_dir: PathBuf,
    /// Diagnostic capture density
    pub density: CaptureDensity,
    /// Viewport capture during teardown
    pub final_capture: bool,
    /// Pause after each scroll while stitching
    pub stitch_settle_ms: u64,
    /// Upper bound on stitched tiles
    pub max_tiles: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let capture = CaptureConfig::default();
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            density: CaptureDensity::default(),
            final_capture: true,
            stitch_settle_ms: capture.stitch_settle_ms,
            max_tiles: capture.max_tiles,
        }
    }
}

/// Baseline section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineSettings {
    /// Baseline directory
    pub dir: PathBuf,
    /// Record missing baselines instead of reporting them
    pub update_missing: bool,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_BASELINE_DIR),
            update_missing: false,
        }
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Application URL
    pub base_url: String,
    /// Wait engine defaults
    pub wait: WaitOptions,
    /// Dialog interceptor timing
    pub dialog: DialogInterceptorConfig,
    /// Screenshot settings
    pub capture: CaptureSettings,
    /// Baseline store
    pub baseline: BaselineSettings,
    /// Pixel comparison
    pub comparator: ComparatorConfig,
    /// Browser bootstrap
    pub browser: DriverConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            wait: WaitOptions::default(),
            dialog: DialogInterceptorConfig::default(),
            capture: CaptureSettings::default(),
            baseline: BaselineSettings::default(),
            comparator: ComparatorConfig::default(),
            browser: DriverConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> VigilResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn load(path: &Path) -> VigilResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VigilError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> VigilResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> VigilResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(VigilError::config("base_url must not be empty"));
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(VigilError::config("wait.poll_interval_ms must be positive"));
        }
        if self.dialog.poll_interval_ms == 0 {
            return Err(VigilError::config("dialog.poll_interval_ms must be positive"));
        }
        if self.capture.max_tiles == 0 {
            return Err(VigilError::config("capture.max_tiles must be positive"));
        }
        if self.browser.viewport_width == 0 || self.browser.viewport_height == 0 {
            return Err(VigilError::config("browser viewport must be non-empty"));
        }
        Ok(())
    }

    /// Set the application URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture.artifact_dir = dir.into();
        self
    }

    /// Set the baseline directory
    #[must_use]
    pub fn with_baseline_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.baseline.dir = dir.into();
        self
    }

    /// Record missing baselines
    #[must_use]
    pub const fn with_update_baselines(mut self, update: bool) -> Self {
        self.baseline.update_missing = update;
        self
    }

    /// Set the capture density
    #[must_use]
    pub const fn with_density(mut self, density: CaptureDensity) -> Self {
        self.capture.density = density;
        self
    }

    /// Headless or headed browser
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.browser.headless = headless;
        self
    }

    /// Set the per-channel tolerance
    #[must_use]
    pub const fn with_channel_tolerance(mut self, tolerance: u8) -> Self {
        self.comparator.channel_tolerance = tolerance;
        self
    }

    /// Session settings
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.base_url.clone()).with_wait(self.wait)
    }

    /// Dialog interceptor settings
    #[must_use]
    pub const fn dialog_config(&self) -> DialogInterceptorConfig {
        self.dialog
    }

    /// Screenshot settings
    #[must_use]
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig::new(self.capture.artifact_dir.clone())
            .with_stitch_settle(self.capture.stitch_settle_ms)
            .with_max_tiles(self.capture.max_tiles)
    }

    /// Comparator with the configured tolerance
    #[must_use]
    pub const fn comparator(&self) -> VisualComparator {
        VisualComparator::new(self.comparator)
    }

    /// Baseline store using the configured comparator
    #[must_use]
    pub fn baseline_store(&self) -> BaselineStore {
        BaselineStore::new(self.baseline.dir.clone())
            .with_update_missing(self.baseline.update_missing)
            .with_comparator(self.comparator())
    }

    /// Browser bootstrap settings
    #[must_use]
    pub fn driver_config(&self) -> DriverConfig {
        self.browser.clone()
    }

    /// Runner settings
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(self.capture_config())
            .with_density(self.capture.density)
            .with_final_capture(self.capture.final_capture)
            .with_dialog(self.dialog_config())
            .with_baselines(self.baseline_store())
    }
}
