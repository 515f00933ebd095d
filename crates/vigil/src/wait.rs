//! Wait Engine
//!
//! Explicit-wait polling for synchronization with an asynchronously mutating page.
//!
//! - The first check runs immediately, then every poll interval.
//! - Transient lookup errors on a tick count as "not yet true".
//! - Polling blocks the caller; nothing keeps running after `wait_for` returns.

use crate::condition::{Condition, Probe};
use crate::driver::{BrowserDriver, ElementHandle};
use crate::result::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT OUTCOME
// =============================================================================

/// Result of a wait: all or nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Condition held
    Satisfied {
        /// Time spent waiting
        elapsed: Duration,
        /// Matched element for element conditions
        element: Option<ElementHandle>,
    },
    /// Condition never held
    TimedOut {
        /// Time spent waiting
        elapsed: Duration,
    },
}

impl WaitOutcome {
    /// Whether the condition held
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Time spent waiting
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Satisfied { elapsed, .. } | Self::TimedOut { elapsed } => *elapsed,
        }
    }

    /// Matched element, if any
    #[must_use]
    pub const fn element(&self) -> Option<&ElementHandle> {
        match self {
            Self::Satisfied { element, .. } => element.as_ref(),
            Self::TimedOut { .. } => None,
        }
    }

    /// Turn a timeout into a `LookupTimeout` error
    pub fn into_match(
        self,
        condition: &Condition,
        options: &WaitOptions,
    ) -> VigilResult<Option<ElementHandle>> {
        match self {
            Self::Satisfied { element, .. } => Ok(element),
            Self::TimedOut { .. } => Err(VigilError::LookupTimeout {
                condition: condition.to_string(),
                timeout_ms: options.timeout_ms,
            }),
        }
    }
}

// =============================================================================
// WAITER IMPLEMENTATION
// =============================================================================

/// Waiter for synchronization operations
#[derive(Debug, Clone, Copy, Default)]
pub struct Waiter {
    options: WaitOptions,
}

impl Waiter {
    /// Create a new waiter with default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom default options
    #[must_use]
    pub const fn with_options(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Default options used by [`Waiter::wait`]
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Wait for a condition using this waiter's default options
    pub fn wait(
        &self,
        driver: &dyn BrowserDriver,
        condition: &Condition,
    ) -> VigilResult<WaitOutcome> {
        self.wait_for(driver, condition, &self.options)
    }

    /// Poll `condition` until it holds or `options.timeout_ms` elapses.
    ///
    /// Only non-transient driver errors are returned as `Err`; a condition that
    /// never holds yields `Ok(WaitOutcome::TimedOut)`.
    pub fn wait_for(
        &self,
        driver: &dyn BrowserDriver,
        condition: &Condition,
        options: &WaitOptions,
    ) -> VigilResult<WaitOutcome> {
        let outcome = poll(
            || match condition.probe(driver) {
                Ok(Probe::Met { element }) => Ok(Some(element)),
                Ok(Probe::Pending) => Ok(None),
                Err(e) if e.is_transient() => {
                    trace!(condition = %condition, error = %e, "transient lookup error");
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            options,
        )?;
        debug!(
            condition = %condition,
            satisfied = outcome.is_satisfied(),
            elapsed_ms = outcome.elapsed().as_millis() as u64,
            "wait finished"
        );
        Ok(outcome)
    }
}

/// Shared polling loop. `check` returns `Some(element)` once the condition holds.
fn poll<F>(mut check: F, options: &WaitOptions) -> VigilResult<WaitOutcome>
where
    F: FnMut() -> VigilResult<Option<Option<ElementHandle>>>,
{
    let start = Instant::now();
    let timeout = options.timeout();
    let poll_interval = options.poll_interval();

    loop {
        if let Some(element) = check()? {
            return Ok(WaitOutcome::Satisfied {
                elapsed: start.elapsed(),
                element,
            });
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(WaitOutcome::TimedOut { elapsed });
        }
        std::thread::sleep(poll_interval.min(timeout - elapsed));
    }
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Poll a plain predicate with the engine's timing rules
pub fn wait_until<F>(predicate: F, options: &WaitOptions) -> WaitOutcome
where
    F: Fn() -> bool,
{
    // `check` never fails, so the error arm is unreachable in practice.
    poll(|| Ok(predicate().then_some(None)), options)
        .unwrap_or(WaitOutcome::TimedOut { elapsed: options.timeout() })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::TodoAppDriver;
    use crate::todo::TodoAppLocators;

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_default() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }

        #[test]
        fn test_wait_options_chained() {
            let opts = WaitOptions::new().with_timeout(5000).with_poll_interval(100);
            assert_eq!(opts.timeout(), Duration::from_millis(5000));
            assert_eq!(opts.poll_interval(), Duration::from_millis(100));
        }
    }

    mod wait_outcome_tests {
        use super::*;

        #[test]
        fn test_into_match_timeout_becomes_lookup_timeout() {
            let outcome = WaitOutcome::TimedOut {
                elapsed: Duration::from_millis(120),
            };
            let cond = Condition::text_present("Todo List");
            let opts = WaitOptions::new().with_timeout(100);
            match outcome.into_match(&cond, &opts) {
                Err(VigilError::LookupTimeout {
                    condition,
                    timeout_ms,
                }) => {
                    assert_eq!(timeout_ms, 100);
                    assert!(condition.contains("Todo List"));
                }
                other => panic!("expected LookupTimeout, got {other:?}"),
            }
        }

        #[test]
        fn test_satisfied_accessors() {
            let outcome = WaitOutcome::Satisfied {
                elapsed: Duration::from_millis(3),
                element: Some(ElementHandle::new("v-1", "li")),
            };
            assert!(outcome.is_satisfied());
            assert_eq!(outcome.element().map(|e| e.id.as_str()), Some("v-1"));
            assert_eq!(outcome.elapsed(), Duration::from_millis(3));
        }
    }

    mod waiter_tests {
        use super::*;

        #[test]
        fn test_immediate_success_has_no_initial_delay() {
            let driver = TodoAppDriver::new();
            let opts = WaitOptions::new().with_timeout(1_000).with_poll_interval(500);
            let outcome = Waiter::new()
                .wait_for(&driver, &Condition::text_present("Login"), &opts)
                .unwrap();
            assert!(outcome.is_satisfied());
            assert!(outcome.elapsed() < Duration::from_millis(100));
        }

        #[test]
        fn test_never_true_times_out_after_timeout() {
            let driver = TodoAppDriver::new();
            let opts = WaitOptions::new().with_timeout(100).with_poll_interval(10);
            let outcome = Waiter::new()
                .wait_for(&driver, &Condition::text_present("Todo List"), &opts)
                .unwrap();
            assert!(!outcome.is_satisfied());
            assert!(outcome.elapsed() >= Duration::from_millis(100));
            assert!(outcome.elapsed() < Duration::from_millis(100 + 10 + 50));
        }

        #[test]
        fn test_becomes_true_before_timeout() {
            let mut driver = TodoAppDriver::new().with_render_latency(Duration::from_millis(60));
            driver.login_now("test", "test123");
            let opts = WaitOptions::new().with_timeout(1_000).with_poll_interval(10);
            let outcome = Waiter::new()
                .wait_for(&driver, &Condition::text_present("Todo List"), &opts)
                .unwrap();
            assert!(outcome.is_satisfied());
            assert!(outcome.elapsed() >= Duration::from_millis(50));
            assert!(outcome.elapsed() < Duration::from_millis(1_000));
        }

        #[test]
        fn test_element_condition_returns_matched_element() {
            let driver = TodoAppDriver::new();
            let outcome = Waiter::new()
                .wait_for(
                    &driver,
                    &Condition::ElementClickable(TodoAppLocators::login_button()),
                    &WaitOptions::new().with_timeout(200),
                )
                .unwrap();
            let element = outcome.element().expect("matched element");
            assert_eq!(element.tag_name, "button");
        }

        #[test]
        fn test_transient_errors_are_swallowed() {
            let driver = TodoAppDriver::new().with_flaky_lookups(3);
            let opts = WaitOptions::new().with_timeout(500).with_poll_interval(5);
            let outcome = Waiter::new()
                .wait_for(
                    &driver,
                    &Condition::ElementPresent(TodoAppLocators::username_input()),
                    &opts,
                )
                .unwrap();
            assert!(outcome.is_satisfied());
        }

        #[test]
        fn test_non_transient_errors_propagate() {
            let driver = TodoAppDriver::new();
            let opts = WaitOptions::new().with_timeout(500);
            let result = Waiter::new().wait_for(
                &driver,
                &Condition::ElementPresent(crate::Locator::xpath("//button")),
                &opts,
            );
            assert!(matches!(result, Err(VigilError::InvalidLocator { .. })));
        }

        #[test]
        fn test_wait_uses_default_options() {
            let waiter = Waiter::with_options(WaitOptions::new().with_timeout(50).with_poll_interval(5));
            assert_eq!(waiter.options().timeout_ms, 50);
            let driver = TodoAppDriver::new();
            let outcome = waiter.wait(&driver, &Condition::DialogPresent).unwrap();
            assert!(!outcome.is_satisfied());
        }
    }

    mod convenience_tests {
        use super::*;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        #[test]
        fn test_wait_until_success() {
            let outcome = wait_until(|| true, &WaitOptions::new().with_timeout(100));
            assert!(outcome.is_satisfied());
        }

        #[test]
        fn test_wait_until_timeout() {
            let outcome = wait_until(|| false, &WaitOptions::new().with_timeout(50).with_poll_interval(5));
            assert!(!outcome.is_satisfied());
        }

        #[test]
        fn test_wait_for_flag_set_by_other_thread() {
            let flag = Arc::new(AtomicBool::new(false));
            let flag_clone = flag.clone();

            let setter = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                flag_clone.store(true, Ordering::SeqCst);
            });

            let opts = WaitOptions::new().with_timeout(1_000).with_poll_interval(10);
            let outcome = wait_until(|| flag.load(Ordering::SeqCst), &opts);
            setter.join().unwrap();
            assert!(outcome.is_satisfied());
        }
    }
}
