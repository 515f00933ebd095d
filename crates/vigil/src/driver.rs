//! BrowserDriver - the session boundary.
//!
//! Everything Vigil does to a page goes through [`BrowserDriver`]. The trait is
//! deliberately small and synchronous: a call returns only once the browser has
//! answered, so waits and dialog handling stay inside the step that issued them.
//!
//! # Implementations
//!
//! - `ChromiumDriver` - real Chromium over CDP (feature `browser`)
//! - [`TodoAppDriver`](crate::mock::TodoAppDriver) - scripted in-memory app for tests

use crate::dialog::Dialog;
use crate::locator::Locator;
use crate::result::VigilResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Handle to an element found in the current page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Unique identifier for the element within its session
    pub id: String,
    /// Element tag name (lower case)
    pub tag_name: String,
    /// Own text at lookup time
    pub text: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            text: String::new(),
        }
    }

    /// Attach the text snapshot
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// Live state of an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Rendered and not hidden
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Own text
    pub text: String,
}

impl ElementState {
    /// Visible and enabled
    #[must_use]
    pub const fn is_clickable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Page geometry in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Full scrollable content height
    pub content_height: u32,
    /// Current vertical scroll offset
    pub scroll_y: u32,
}

impl PageMetrics {
    /// Whether the content fits in one viewport
    #[must_use]
    pub const fn fits_viewport(&self) -> bool {
        self.content_height <= self.viewport_height
    }
}

/// Browser bootstrap configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Executable path override
    pub chromium_path: Option<String>,
    /// Chromium sandbox (disable for containers)
    pub sandbox: bool,
    /// Timeout for page loads
    pub navigation_timeout_ms: u64,
    /// Timeout for any single DevTools command
    pub command_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            sandbox: true,
            navigation_timeout_ms: 30_000,
            command_timeout_ms: 10_000,
        }
    }
}

impl DriverConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set the chromium executable
    #[must_use]
    pub fn chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable the sandbox (for containers/CI)
    #[must_use]
    pub const fn no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Navigation timeout
    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Per-command timeout
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Capability set the harness needs from a browser.
///
/// Query methods take `&self` so conditions can be probed without exclusive
/// access; anything that changes the page takes `&mut self`.
pub trait BrowserDriver: Send {
    /// Navigate to an absolute URL and wait for the load to finish
    fn navigate(&mut self, url: &str) -> VigilResult<()>;

    /// Current document URL
    fn current_url(&self) -> VigilResult<String>;

    /// First element matching the locator in document order
    fn find_element(&self, locator: &Locator) -> VigilResult<Option<ElementHandle>>;

    /// Live state of a previously found element.
    ///
    /// Fails with `StaleElement` when the element left the document.
    fn element_state(&self, element: &ElementHandle) -> VigilResult<ElementState>;

    /// Clear an input's value
    fn clear(&mut self, element: &ElementHandle) -> VigilResult<()>;

    /// Append text to an input's value
    fn send_keys(&mut self, element: &ElementHandle, text: &str) -> VigilResult<()>;

    /// Click an element
    fn click(&mut self, element: &ElementHandle) -> VigilResult<()>;

    /// Rendered text of the whole document body
    fn page_text(&self) -> VigilResult<String>;

    /// Currently open native dialog, if the driver can observe it
    fn active_dialog(&self) -> VigilResult<Option<Dialog>>;

    /// Type into the open prompt dialog
    fn send_dialog_text(&mut self, text: &str) -> VigilResult<()>;

    /// Accept the open dialog (fails with `NoDialog` if none)
    fn accept_dialog(&mut self) -> VigilResult<Dialog>;

    /// Dismiss the open dialog (fails with `NoDialog` if none)
    fn dismiss_dialog(&mut self) -> VigilResult<Dialog>;

    /// Viewport and content geometry
    fn page_metrics(&self) -> VigilResult<PageMetrics>;

    /// Scroll vertically; returns the offset actually reached
    fn scroll_to(&mut self, y: u32) -> VigilResult<u32>;

    /// PNG image of the current viewport
    fn screenshot_png(&mut self) -> VigilResult<Vec<u8>>;

    /// Release the browser
    fn close(&mut self) -> VigilResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod element_handle_tests {
        use super::*;

        #[test]
        fn test_element_handle_creation() {
            let elem = ElementHandle::new("v-1", "button").with_text("Add");
            assert_eq!(elem.id, "v-1");
            assert_eq!(elem.tag_name, "button");
            assert_eq!(elem.text, "Add");
        }

        #[test]
        fn test_element_state_clickable() {
            let mut state = ElementState {
                visible: true,
                enabled: true,
                text: String::new(),
            };
            assert!(state.is_clickable());
            state.enabled = false;
            assert!(!state.is_clickable());
        }
    }

    mod driver_config_tests {
        use super::*;

        #[test]
        fn test_config_default() {
            let config = DriverConfig::default();
            assert!(config.headless);
            assert!(config.sandbox);
            assert_eq!(config.viewport_width, 1280);
            assert_eq!(config.navigation_timeout(), Duration::from_secs(30));
        }

        #[test]
        fn test_config_builder() {
            let config = DriverConfig::new()
                .headless(false)
                .viewport(800, 600)
                .chromium_path("/usr/bin/chromium")
                .no_sandbox();

            assert!(!config.headless);
            assert!(!config.sandbox);
            assert_eq!(config.viewport_width, 800);
            assert_eq!(config.viewport_height, 600);
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        }
    }

    #[test]
    fn test_page_metrics_fits_viewport() {
        let metrics = PageMetrics {
            viewport_width: 800,
            viewport_height: 600,
            content_height: 600,
            scroll_y: 0,
        };
        assert!(metrics.fits_viewport());
        let tall = PageMetrics {
            content_height: 1500,
            ..metrics
        };
        assert!(!tall.fits_viewport());
    }
}
