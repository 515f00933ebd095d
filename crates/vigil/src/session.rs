//! Session: one browser bound to one page for the length of a scenario run.

use crate::condition::Condition;
use crate::driver::{BrowserDriver, ElementHandle};
use crate::locator::Locator;
use crate::result::{VigilError, VigilResult};
use crate::wait::{WaitOptions, WaitOutcome, Waiter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default application URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Session defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Relative navigation targets are resolved against this
    pub base_url: String,
    /// Default wait timeout and poll interval
    pub wait: WaitOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            wait: WaitOptions::default(),
        }
    }
}

impl SessionConfig {
    /// Config for an app at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the default wait options
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Absolute URL for `target`
    #[must_use]
    pub fn resolve(&self, target: &str) -> String {
        if target.contains("://") || target.starts_with("about:") {
            return target.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if target.is_empty() {
            format!("{base}/")
        } else if target.starts_with('/') {
            format!("{base}{target}")
        } else {
            format!("{base}/{target}")
        }
    }
}

/// Live handle to a browser page.
///
/// The driver is closed exactly once, by [`Session::close`] or on drop.
pub struct Session {
    driver: Box<dyn BrowserDriver>,
    config: SessionConfig,
    current_target: Option<String>,
    waiter: Waiter,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("current_target", &self.current_target)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap a driver
    #[must_use]
    pub fn new(driver: Box<dyn BrowserDriver>, config: SessionConfig) -> Self {
        Self {
            driver,
            waiter: Waiter::with_options(config.wait),
            config,
            current_target: None,
            closed: false,
        }
    }

    /// Session defaults
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Last navigation target, as resolved
    #[must_use]
    pub fn current_target(&self) -> Option<&str> {
        self.current_target.as_deref()
    }

    /// Whether [`close`](Self::close) has run
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Underlying driver for queries
    pub fn driver(&self) -> VigilResult<&dyn BrowserDriver> {
        self.ensure_open()?;
        Ok(self.driver.as_ref())
    }

    /// Underlying driver for actions
    pub fn driver_mut(&mut self) -> VigilResult<&mut dyn BrowserDriver> {
        self.ensure_open()?;
        Ok(self.driver.as_mut())
    }

    /// Navigate to `target` (absolute, or relative to the base URL)
    pub fn navigate(&mut self, target: &str) -> VigilResult<()> {
        self.ensure_open()?;
        let url = self.config.resolve(target);
        info!(url = %url, "navigate");
        self.driver.navigate(&url)?;
        self.current_target = Some(url);
        Ok(())
    }

    /// Wait with the session defaults
    pub fn wait_for(&self, condition: &Condition) -> VigilResult<WaitOutcome> {
        self.wait_for_with(condition, &self.config.wait)
    }

    /// Wait with explicit options
    pub fn wait_for_with(
        &self,
        condition: &Condition,
        options: &WaitOptions,
    ) -> VigilResult<WaitOutcome> {
        self.ensure_open()?;
        self.waiter.wait_for(self.driver.as_ref(), condition, options)
    }

    /// Wait until an element matching `locator` is clickable and return it
    pub fn find_clickable(&self, locator: &Locator) -> VigilResult<ElementHandle> {
        let condition = Condition::ElementClickable(locator.clone());
        self.wait_for(&condition)?
            .into_match(&condition, &self.config.wait)?
            .ok_or_else(|| VigilError::ElementNotFound {
                locator: locator.to_string(),
            })
    }

    /// One immediate lookup, no waiting
    pub fn find(&self, locator: &Locator) -> VigilResult<Option<ElementHandle>> {
        self.ensure_open()?;
        self.driver.find_element(locator)
    }

    /// Replace an input's value
    pub fn fill(&mut self, element: &ElementHandle, text: &str) -> VigilResult<()> {
        self.ensure_open()?;
        debug!(element = %element.id, "fill");
        self.driver.clear(element)?;
        self.driver.send_keys(element, text)
    }

    /// Click an element
    pub fn click(&mut self, element: &ElementHandle) -> VigilResult<()> {
        self.ensure_open()?;
        debug!(element = %element.id, "click");
        self.driver.click(element)
    }

    /// Rendered page text
    pub fn page_text(&self) -> VigilResult<String> {
        self.ensure_open()?;
        self.driver.page_text()
    }

    /// Close the browser. Later calls are no-ops.
    pub fn close(&mut self) -> VigilResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("closing session");
        self.driver.close()
    }

    fn ensure_open(&self) -> VigilResult<()> {
        if self.closed {
            Err(VigilError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "session close on drop failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::TodoAppDriver;
    use crate::todo::TodoAppLocators;

    fn session(driver: TodoAppDriver) -> Session {
        Session::new(
            Box::new(driver),
            SessionConfig::new("http://app.test")
                .with_wait(WaitOptions::new().with_timeout(300).with_poll_interval(10)),
        )
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_resolve_targets() {
            let config = SessionConfig::new("http://localhost:3000/");
            assert_eq!(config.resolve("/"), "http://localhost:3000/");
            assert_eq!(config.resolve(""), "http://localhost:3000/");
            assert_eq!(config.resolve("todos"), "http://localhost:3000/todos");
            assert_eq!(config.resolve("https://other.test/x"), "https://other.test/x");
        }

        #[test]
        fn test_defaults() {
            let config = SessionConfig::default();
            assert_eq!(config.base_url, DEFAULT_BASE_URL);
            assert_eq!(config.wait, WaitOptions::default());
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_navigate_records_target() {
            let driver = TodoAppDriver::new();
            let mut session = session(driver);
            session.navigate("/").unwrap();
            assert_eq!(session.current_target(), Some("http://app.test/"));
            assert_eq!(
                session.driver().unwrap().current_url().unwrap(),
                "http://app.test/"
            );
        }

        #[test]
        fn test_close_is_idempotent_and_blocks_use() {
            let driver = TodoAppDriver::new();
            let observer = driver.observer();
            let mut session = session(driver);
            session.close().unwrap();
            session.close().unwrap();
            assert!(observer.is_closed());
            assert!(matches!(session.page_text(), Err(VigilError::SessionClosed)));
            assert!(matches!(session.navigate("/"), Err(VigilError::SessionClosed)));
        }

        #[test]
        fn test_drop_closes_driver() {
            let driver = TodoAppDriver::new();
            let observer = driver.observer();
            drop(session(driver));
            assert!(observer.is_closed());
        }
    }

    mod interaction_tests {
        use super::*;

        #[test]
        fn test_fill_replaces_value_and_click_logs_in() {
            let mut session = session(TodoAppDriver::new());
            let user = session.find_clickable(&TodoAppLocators::username_input()).unwrap();
            session.fill(&user, "junk").unwrap();
            session.fill(&user, "test").unwrap();
            let pass = session.find_clickable(&TodoAppLocators::password_input()).unwrap();
            session.fill(&pass, "test123").unwrap();
            let login = session.find_clickable(&TodoAppLocators::login_button()).unwrap();
            session.click(&login).unwrap();
            assert!(session
                .wait_for(&Condition::text_present("Todo List"))
                .unwrap()
                .is_satisfied());
        }

        #[test]
        fn test_find_clickable_times_out() {
            let session = session(TodoAppDriver::new());
            let err = session
                .find_clickable(&TodoAppLocators::add_button())
                .unwrap_err();
            assert!(matches!(err, VigilError::LookupTimeout { timeout_ms: 300, .. }));
        }

        #[test]
        fn test_find_is_immediate() {
            let session = session(TodoAppDriver::new());
            assert!(session.find(&TodoAppLocators::add_button()).unwrap().is_none());
        }
    }
}
