//! Locator abstraction for element selection.
//!
//! A [`Locator`] is a pure value: a strategy tag plus a selector string,
//! optionally refined by a text filter and scoped to a parent locator.
//! It never touches the page by itself; drivers resolve it.
//!
//! ```
//! use vigil::Locator;
//!
//! let edit = Locator::tag("button")
//!     .with_exact_text("Edit")
//!     .within(Locator::tag("li").with_text("Test Item"));
//! assert_eq!(
//!     edit.to_string(),
//!     "tag 'button' with text = \"Edit\" within (tag 'li' with text ~ \"Test Item\")"
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy used to find candidate elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// CSS selector (e.g., "button.primary")
    Css,
    /// XPath expression
    XPath,
    /// Tag name (e.g., "button")
    TagName,
    /// Attribute equality, selector written as `name=value`
    Attribute,
    /// Elements whose own text contains the selector
    TextContent,
}

impl Strategy {
    /// Short name used in descriptions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::TagName => "tag",
            Self::Attribute => "attribute",
            Self::TextContent => "text",
        }
    }
}

/// Text filter applied to the element's own text (direct text nodes only)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    /// Own text contains the value
    Contains(String),
    /// Own text, trimmed, equals the value
    Exact(String),
}

impl TextMatch {
    /// Check a candidate's own text against this filter
    #[must_use]
    pub fn matches(&self, own_text: &str) -> bool {
        match self {
            Self::Contains(t) => own_text.contains(t.as_str()),
            Self::Exact(t) => own_text.trim() == t,
        }
    }
}

/// An immutable description of how to find elements in the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Strategy tag
    pub strategy: Strategy,
    /// Selector string, interpreted per strategy
    pub selector: String,
    /// Optional own-text filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextMatch>,
    /// Optional scope; candidates must be descendants of a parent match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Locator>>,
}

impl Locator {
    /// Create a locator from a strategy and selector
    #[must_use]
    pub fn new(strategy: Strategy, selector: impl Into<String>) -> Self {
        Self {
            strategy,
            selector: selector.into(),
            text: None,
            parent: None,
        }
    }

    /// CSS selector locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    /// XPath locator
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, expr)
    }

    /// Tag name locator
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(Strategy::TagName, name)
    }

    /// Attribute equality locator
    #[must_use]
    pub fn attribute(name: &str, value: &str) -> Self {
        Self::new(Strategy::Attribute, format!("{name}={value}"))
    }

    /// Text content locator
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Strategy::TextContent, text)
    }

    /// Keep only candidates whose own text contains `text`
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextMatch::Contains(text.into()));
        self
    }

    /// Keep only candidates whose own text equals `text`
    #[must_use]
    pub fn with_exact_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextMatch::Exact(text.into()));
        self
    }

    /// Scope this locator to descendants of `parent` matches
    #[must_use]
    pub fn within(mut self, parent: Locator) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Split an attribute selector into `(name, value)`.
    ///
    /// Surrounding single or double quotes on the value are dropped.
    #[must_use]
    pub fn attribute_parts(&self) -> Option<(&str, &str)> {
        if self.strategy != Strategy::Attribute {
            return None;
        }
        let (name, value) = self.selector.split_once('=')?;
        let value = value
            .trim()
            .trim_matches(|c| c == '\'' || c == '"');
        Some((name.trim(), value))
    }

    /// JavaScript expression resolving to the first match or `null`
    #[must_use]
    pub fn to_query(&self) -> String {
        format!(
            "(() => {{ {OWN_TEXT_FN} return ({}).at(0) || null; }})()",
            self.matches_js()
        )
    }

    fn matches_js(&self) -> String {
        let scoped = match &self.parent {
            Some(parent) => format!(
                "({}).flatMap(root => {})",
                parent.matches_js(),
                self.candidates_js("root")
            ),
            None => self.candidates_js("document"),
        };
        match &self.text {
            Some(TextMatch::Contains(t)) => {
                format!("{scoped}.filter(el => ownText(el).includes({}))", js_str(t))
            }
            Some(TextMatch::Exact(t)) => {
                format!("{scoped}.filter(el => ownText(el) === {})", js_str(t))
            }
            None => scoped,
        }
    }

    fn candidates_js(&self, root: &str) -> String {
        match self.strategy {
            Strategy::Css | Strategy::TagName => format!(
                "Array.from({root}.querySelectorAll({}))",
                js_str(&self.selector)
            ),
            Strategy::Attribute => {
                let (name, value) = self.attribute_parts().unwrap_or((self.selector.as_str(), ""));
                format!(
                    "Array.from({root}.querySelectorAll('*')).filter(el => el.getAttribute({}) === {})",
                    js_str(name),
                    js_str(value)
                )
            }
            Strategy::XPath => format!(
                "(() => {{ const r = document.evaluate({}, {root}, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 return Array.from({{ length: r.snapshotLength }}, (_, i) => r.snapshotItem(i)); }})()",
                js_str(&self.selector)
            ),
            Strategy::TextContent => format!(
                "Array.from({root}.querySelectorAll('*')).filter(el => ownText(el).includes({}))",
                js_str(&self.selector)
            ),
        }
    }
}

const OWN_TEXT_FN: &str = "const ownText = el => Array.from(el.childNodes)\
.filter(n => n.nodeType === Node.TEXT_NODE).map(n => n.textContent).join('').trim();";

/// Quote a string as a JavaScript literal
fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.strategy.as_str(), self.selector)?;
        match &self.text {
            Some(TextMatch::Contains(t)) => write!(f, " with text ~ {t:?}")?,
            Some(TextMatch::Exact(t)) => write!(f, " with text = {t:?}")?,
            None => {}
        }
        if let Some(parent) = &self.parent {
            write!(f, " within ({parent})")?;
        }
        Ok(())
    }
}
