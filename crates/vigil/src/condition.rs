//! Condition predicates for explicit waits.
//!
//! A [`Condition`] is stateless: every poll tick re-evaluates it from scratch
//! against the driver.

use crate::driver::{BrowserDriver, ElementHandle};
use crate::locator::Locator;
use crate::result::VigilResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named predicate over the page state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// An element matching the locator is attached
    ElementPresent(Locator),
    /// An element matching the locator is visible and enabled
    ElementClickable(Locator),
    /// Text appears in the page, or in the first match of `within`
    TextPresent {
        /// Text to look for
        text: String,
        /// Restrict the search to one node
        #[serde(default, skip_serializing_if = "Option::is_none")]
        within: Option<Locator>,
    },
    /// Text does not appear in the page, or in the first match of `within`
    TextAbsent {
        /// Text that must be gone
        text: String,
        /// Restrict the search to one node
        #[serde(default, skip_serializing_if = "Option::is_none")]
        within: Option<Locator>,
    },
    /// A native dialog is open
    DialogPresent,
}

/// Result of a single evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Not true yet
    Pending,
    /// True; element-based conditions carry the matched element
    Met {
        /// Matched element, when the condition is about one
        element: Option<ElementHandle>,
    },
}

impl Probe {
    const fn met() -> Self {
        Self::Met { element: None }
    }

    /// Whether the condition held
    #[must_use]
    pub const fn is_met(&self) -> bool {
        matches!(self, Self::Met { .. })
    }
}

impl Condition {
    /// Text appears anywhere in the page
    #[must_use]
    pub fn text_present(text: impl Into<String>) -> Self {
        Self::TextPresent {
            text: text.into(),
            within: None,
        }
    }

    /// Text is gone from the page
    #[must_use]
    pub fn text_absent(text: impl Into<String>) -> Self {
        Self::TextAbsent {
            text: text.into(),
            within: None,
        }
    }

    /// Evaluate once against the driver.
    ///
    /// Lookup errors are returned as-is; the wait engine decides which of them
    /// mean "not yet".
    pub fn probe(&self, driver: &dyn BrowserDriver) -> VigilResult<Probe> {
        match self {
            Self::ElementPresent(locator) => Ok(match driver.find_element(locator)? {
                Some(element) => Probe::Met {
                    element: Some(element),
                },
                None => Probe::Pending,
            }),
            Self::ElementClickable(locator) => {
                let Some(element) = driver.find_element(locator)? else {
                    return Ok(Probe::Pending);
                };
                if driver.element_state(&element)?.is_clickable() {
                    Ok(Probe::Met {
                        element: Some(element),
                    })
                } else {
                    Ok(Probe::Pending)
                }
            }
            Self::TextPresent { text, within } => {
                let found = scoped_text(driver, within.as_ref())?
                    .is_some_and(|content| content.contains(text.as_str()));
                Ok(if found { Probe::met() } else { Probe::Pending })
            }
            Self::TextAbsent { text, within } => {
                let found = scoped_text(driver, within.as_ref())?
                    .is_some_and(|content| content.contains(text.as_str()));
                Ok(if found { Probe::Pending } else { Probe::met() })
            }
            Self::DialogPresent => Ok(if driver.active_dialog()?.is_some() {
                Probe::met()
            } else {
                Probe::Pending
            }),
        }
    }
}

/// Text of the scope node, the whole page without a scope, `None` when the
/// scope node is missing.
fn scoped_text(driver: &dyn BrowserDriver, within: Option<&Locator>) -> VigilResult<Option<String>> {
    match within {
        None => driver.page_text().map(Some),
        Some(locator) => match driver.find_element(locator)? {
            Some(element) => Ok(Some(driver.element_state(&element)?.text)),
            None => Ok(None),
        },
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElementPresent(l) => write!(f, "element present: {l}"),
            Self::ElementClickable(l) => write!(f, "element clickable: {l}"),
            Self::TextPresent { text, within } => {
                write!(f, "text {text:?} present")?;
                within.as_ref().map_or(Ok(()), |l| write!(f, " in {l}"))
            }
            Self::TextAbsent { text, within } => {
                write!(f, "text {text:?} absent")?;
                within.as_ref().map_or(Ok(()), |l| write!(f, " in {l}"))
            }
            Self::DialogPresent => write!(f, "dialog present"),
        }
    }
}
