//! Result and error types for Vigil.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Vigil operations
pub type VigilResult<T> = Result<T, VigilError>;

/// Errors that can occur in Vigil
#[derive(Debug, Error)]
pub enum VigilError {
    /// A wait condition never became true within its timeout
    #[error("Timed out after {timeout_ms}ms waiting for {condition}")]
    LookupTimeout {
        /// Description of the awaited condition
        condition: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// A dialog appeared but could not be resolved
    #[error("Dialog handling failed: {message}")]
    DialogHandlingFailure {
        /// Error message
        message: String,
    },

    /// Screenshot could not be produced or written
    #[error("Capture of '{step}' failed: {message}")]
    CaptureFailure {
        /// Step the capture belonged to
        step: String,
        /// Error message
        message: String,
    },

    /// Image could not be decoded
    #[error("Failed to decode {}: {message}", path.display())]
    DecodeFailure {
        /// Offending image path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// No element matched the locator
    #[error("No element matches {locator}")]
    ElementNotFound {
        /// Locator description
        locator: String,
    },

    /// Element handle no longer attached to the document
    #[error("Element {id} is no longer attached to the document")]
    StaleElement {
        /// Element handle id
        id: String,
    },

    /// Accept/dismiss issued while no dialog is open
    #[error("No dialog is open")]
    NoDialog,

    /// Page operation blocked by an open native dialog
    #[error("Unexpected {kind} dialog is open: {message}")]
    UnexpectedDialog {
        /// Dialog kind
        kind: String,
        /// Dialog message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Generic driver/protocol error
    #[error("Driver error: {message}")]
    DriverError {
        /// Error message
        message: String,
        /// Whether retrying on the next poll tick may succeed
        transient: bool,
    },

    /// Locator the driver cannot evaluate
    #[error("Invalid locator {locator}: {message}")]
    InvalidLocator {
        /// Locator description
        locator: String,
        /// Error message
        message: String,
    },

    /// Operation on a closed session
    #[error("Session is closed")]
    SessionClosed,

    /// Step referenced the previous match but none was produced
    #[error("No matched element from the previous step")]
    NoMatchedElement,

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Image encoding/decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl VigilError {
    /// Create a driver error that may clear up on the next poll
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::DriverError {
            message: message.into(),
            transient: true,
        }
    }

    /// Create a driver error that will not clear up by retrying
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::DriverError {
            message: message.into(),
            transient: false,
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Lookup errors a poll tick treats as "not yet true".
    ///
    /// Everything else aborts the wait immediately.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::StaleElement { .. }
                | Self::DriverError {
                    transient: true,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(VigilError::ElementNotFound {
            locator: "button".into()
        }
        .is_transient());
        assert!(VigilError::StaleElement { id: "v-1".into() }.is_transient());
        assert!(VigilError::transient("node detached").is_transient());

        assert!(!VigilError::driver("connection reset").is_transient());
        assert!(!VigilError::SessionClosed.is_transient());
        assert!(!VigilError::UnexpectedDialog {
            kind: "alert".into(),
            message: "Login failed".into()
        }
        .is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = VigilError::LookupTimeout {
            condition: "text 'Todo List' present".into(),
            timeout_ms: 500,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 500ms waiting for text 'Todo List' present"
        );

        let err = VigilError::DecodeFailure {
            path: PathBuf::from("a.png"),
            message: "bad magic".into(),
        };
        assert_eq!(err.to_string(), "Failed to decode a.png: bad magic");
    }
}
