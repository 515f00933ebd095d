//! Chromium driver over the DevTools protocol.
//!
//! The harness is synchronous, chromiumoxide is not. The driver owns a small
//! multi-threaded tokio runtime and blocks on every command, each bounded by
//! the configured command timeout.
//!
//! Native dialogs block `Runtime.evaluate`, so dialog state is tracked from
//! `Page.javascriptDialogOpening`/`Closed` events and page queries refuse to
//! run while one is open.

use crate::dialog::{Dialog, DialogType};
use crate::driver::{BrowserDriver, DriverConfig, ElementHandle, ElementState, PageMetrics};
use crate::locator::Locator;
use crate::result::{VigilError, VigilResult};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, EventJavascriptDialogClosed,
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Attribute used to tag elements returned by lookups
const ELEMENT_ID_ATTR: &str = "data-vigil-id";

type DialogSlot = Arc<Mutex<Option<Dialog>>>;

#[derive(Debug, Deserialize)]
struct FoundElement {
    id: String,
    tag: String,
    text: String,
}

/// [`BrowserDriver`] backed by a Chromium instance
pub struct ChromiumDriver {
    config: DriverConfig,
    runtime: Runtime,
    browser: Option<Browser>,
    page: Page,
    tasks: Vec<JoinHandle<()>>,
    dialog: DialogSlot,
    prompt_text: Option<String>,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver")
            .field("config", &self.config)
            .field("open", &self.browser.is_some())
            .finish_non_exhaustive()
    }
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank page
    pub fn launch(config: DriverConfig) -> VigilResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| launch_error(e.to_string()))?;

        let mut builder = CdpConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .viewport(None)
            .request_timeout(config.command_timeout());
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(launch_error)?;

        info!(headless = config.headless, "launching chromium");
        let (browser, mut handler) = runtime
            .block_on(Browser::launch(cdp_config))
            .map_err(|e| launch_error(e.to_string()))?;

        let mut tasks = vec![runtime.spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        })];

        let page = runtime
            .block_on(browser.new_page("about:blank"))
            .map_err(|e| launch_error(e.to_string()))?;

        let dialog: DialogSlot = Arc::new(Mutex::new(None));
        let (mut opening, mut closed) = runtime
            .block_on(async {
                let opening = page.event_listener::<EventJavascriptDialogOpening>().await?;
                let closed = page.event_listener::<EventJavascriptDialogClosed>().await?;
                Ok::<_, CdpError>((opening, closed))
            })
            .map_err(|e| launch_error(e.to_string()))?;

        let slot = Arc::clone(&dialog);
        tasks.push(runtime.spawn(async move {
            while let Some(event) = opening.next().await {
                let kind = DialogType::from_protocol(event.r#type.as_ref());
                let observed = match kind {
                    DialogType::Prompt => {
                        Dialog::prompt(event.message.clone(), event.default_prompt.clone())
                    }
                    kind => Dialog::new(kind, event.message.clone()),
                };
                debug!(kind = %kind, message = %event.message, "dialog opened");
                if let Ok(mut current) = slot.lock() {
                    *current = Some(observed);
                }
            }
        }));
        let slot = Arc::clone(&dialog);
        tasks.push(runtime.spawn(async move {
            while let Some(event) = closed.next().await {
                debug!(accepted = event.result, "dialog closed");
                if let Ok(mut current) = slot.lock() {
                    *current = None;
                }
            }
        }));

        Ok(Self {
            config,
            runtime,
            browser: Some(browser),
            page,
            tasks,
            dialog,
            prompt_text: None,
        })
    }

    /// Bootstrap settings
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn ensure_open(&self) -> VigilResult<()> {
        if self.browser.is_some() {
            Ok(())
        } else {
            Err(VigilError::SessionClosed)
        }
    }

    fn observed_dialog(&self) -> VigilResult<Option<Dialog>> {
        self.dialog
            .lock()
            .map(|d| d.clone())
            .map_err(|_| VigilError::driver("dialog state poisoned"))
    }

    fn take_dialog(&self) -> Option<Dialog> {
        self.dialog.lock().ok().and_then(|mut d| d.take())
    }

    /// Fails with `UnexpectedDialog` while a dialog blocks the page
    fn ensure_unblocked(&self) -> VigilResult<()> {
        self.ensure_open()?;
        match self.observed_dialog()? {
            Some(dialog) => Err(dialog.blocking_error()),
            None => Ok(()),
        }
    }

    fn block_on<T, F>(&self, action: &str, timeout: Duration, fut: F) -> VigilResult<T>
    where
        F: Future<Output = Result<T, CdpError>>,
    {
        match self.runtime.block_on(tokio::time::timeout(timeout, fut)) {
            Ok(result) => result.map_err(|e| VigilError::driver(format!("{action}: {e}"))),
            Err(_) => Err(VigilError::driver(format!(
                "{action}: no response within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    fn eval<T: DeserializeOwned>(&self, action: &str, expr: String) -> VigilResult<T> {
        self.ensure_unblocked()?;
        let result = self.block_on(action, self.config.command_timeout(), self.page.evaluate(expr))?;
        result
            .into_value()
            .map_err(|e| VigilError::driver(format!("{action}: {e}")))
    }

    /// Run `body` against the tagged element; `false` from the script means stale
    fn with_element(&self, action: &str, element: &ElementHandle, body: &str) -> VigilResult<()> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; {body} return true; }})()",
            js_str(&element_selector(&element.id))
        );
        if self.eval::<bool>(action, expr)? {
            Ok(())
        } else {
            Err(VigilError::StaleElement {
                id: element.id.clone(),
            })
        }
    }

    fn resolve_dialog(&mut self, accept: bool) -> VigilResult<Dialog> {
        self.ensure_open()?;
        let observed = self.take_dialog();
        let mut params = HandleJavaScriptDialogParams::new(accept);
        params.prompt_text = self.prompt_text.take();
        let outcome = self.block_on(
            "handle dialog",
            self.config.command_timeout(),
            self.page.execute(params),
        );
        match (outcome, observed) {
            (Ok(_), Some(dialog)) => Ok(dialog),
            // Opening event was missed; the kind is unknown.
            (Ok(_), None) => Ok(Dialog::new(DialogType::Alert, String::new())),
            (Err(e), _) if reports_no_dialog(&e) => Err(VigilError::NoDialog),
            (Err(e), _) => Err(e),
        }
    }
}

impl BrowserDriver for ChromiumDriver {
    fn navigate(&mut self, url: &str) -> VigilResult<()> {
        self.ensure_unblocked()?;
        let result = self.runtime.block_on(tokio::time::timeout(
            self.config.navigation_timeout(),
            self.page.goto(url),
        ));
        match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(VigilError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(VigilError::NavigationError {
                url: url.to_string(),
                message: format!(
                    "no load within {}ms",
                    self.config.navigation_timeout_ms
                ),
            }),
        }
    }

    fn current_url(&self) -> VigilResult<String> {
        self.ensure_open()?;
        let url = self.block_on("current url", self.config.command_timeout(), self.page.url())?;
        Ok(url.unwrap_or_default())
    }

    fn find_element(&self, locator: &Locator) -> VigilResult<Option<ElementHandle>> {
        let expr = format!(
            "(() => {{ const el = {query}; if (!el) return null; \
             let id = el.getAttribute({attr}); \
             if (!id) {{ window.__vigilSeq = (window.__vigilSeq || 0) + 1; id = 'vigil-' + window.__vigilSeq; el.setAttribute({attr}, id); }} \
             return {{ id, tag: el.tagName.toLowerCase(), text: (el.innerText || el.value || '').trim() }}; }})()",
            query = locator.to_query(),
            attr = js_str(ELEMENT_ID_ATTR),
        );
        let found: Option<FoundElement> = self.eval("find element", expr)?;
        Ok(found.map(|f| ElementHandle::new(f.id, f.tag).with_text(f.text)))
    }

    fn element_state(&self, element: &ElementHandle) -> VigilResult<ElementState> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return null; \
             const style = getComputedStyle(el); const rect = el.getBoundingClientRect(); \
             return {{ visible: style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0), \
             enabled: !el.disabled, text: (el.innerText || el.value || '').trim() }}; }})()",
            js_str(&element_selector(&element.id))
        );
        let state: Option<ElementState> = self.eval("element state", expr)?;
        state.ok_or_else(|| VigilError::StaleElement {
            id: element.id.clone(),
        })
    }

    fn clear(&mut self, element: &ElementHandle) -> VigilResult<()> {
        self.with_element("clear", element, &set_value_js("''"))
    }

    fn send_keys(&mut self, element: &ElementHandle, text: &str) -> VigilResult<()> {
        let value = format!("el.value + {}", js_str(text));
        self.with_element("send keys", element, &format!("el.focus(); {}", set_value_js(&value)))
    }

    fn click(&mut self, element: &ElementHandle) -> VigilResult<()> {
        // Handlers may open a dialog; run the click after this command returns.
        self.with_element("click", element, "setTimeout(() => el.click(), 0);")
    }

    fn page_text(&self) -> VigilResult<String> {
        self.eval(
            "page text",
            "document.body ? document.body.innerText : ''".to_string(),
        )
    }

    fn active_dialog(&self) -> VigilResult<Option<Dialog>> {
        self.ensure_open()?;
        self.observed_dialog()
    }

    fn send_dialog_text(&mut self, text: &str) -> VigilResult<()> {
        self.ensure_open()?;
        if let Some(dialog) = self.observed_dialog()? {
            if dialog.dialog_type() != DialogType::Prompt {
                return Err(VigilError::driver("open dialog does not accept text"));
            }
        }
        self.prompt_text = Some(text.to_string());
        Ok(())
    }

    fn accept_dialog(&mut self) -> VigilResult<Dialog> {
        self.resolve_dialog(true)
    }

    fn dismiss_dialog(&mut self) -> VigilResult<Dialog> {
        self.resolve_dialog(false)
    }

    fn page_metrics(&self) -> VigilResult<PageMetrics> {
        self.eval(
            "page metrics",
            "({ viewport_width: window.innerWidth, viewport_height: window.innerHeight, \
             content_height: Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0), \
             scroll_y: Math.round(window.scrollY) })"
                .to_string(),
        )
    }

    fn scroll_to(&mut self, y: u32) -> VigilResult<u32> {
        self.eval(
            "scroll",
            format!("(() => {{ window.scrollTo(0, {y}); return Math.round(window.scrollY); }})()"),
        )
    }

    fn screenshot_png(&mut self) -> VigilResult<Vec<u8>> {
        self.ensure_unblocked()?;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let screenshot = self.block_on(
            "screenshot",
            self.config.command_timeout(),
            self.page.execute(params),
        )?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&screenshot.data)
            .map_err(|e| VigilError::driver(format!("screenshot: {e}")))
    }

    fn close(&mut self) -> VigilResult<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let timeout = self.config.command_timeout();
        let result = self.runtime.block_on(async {
            tokio::time::timeout(timeout, async {
                browser.close().await?;
                browser.wait().await?;
                Ok::<_, CdpError>(())
            })
            .await
        });
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(VigilError::driver(format!("close: {e}"))),
            Err(_) => {
                warn!("chromium did not exit in time");
                Err(VigilError::driver("close: browser did not exit in time"))
            }
        }
    }
}

fn launch_error(message: String) -> VigilError {
    VigilError::BrowserLaunchError { message }
}

fn element_selector(id: &str) -> String {
    format!("[{ELEMENT_ID_ATTR}=\"{id}\"]")
}

/// Assign `value` through the native setter so framework-controlled inputs see it
fn set_value_js(value: &str) -> String {
    format!(
        "const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
         Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {value}); \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }}));"
    )
}

fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Chrome's answer to `Page.handleJavaScriptDialog` when nothing is open
const NO_DIALOG_SHOWING: &str = "No dialog is showing";

/// Only Chrome's own "nothing open" reply means there was no dialog;
/// timeouts and transport failures stay driver errors.
fn reports_no_dialog(error: &VigilError) -> bool {
    matches!(error, VigilError::DriverError { message, .. } if message.contains(NO_DIALOG_SHOWING))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_element_selector() {
        assert_eq!(element_selector("vigil-3"), "[data-vigil-id=\"vigil-3\"]");
        assert_eq!(
            js_str(&element_selector("vigil-3")),
            r#""[data-vigil-id=\"vigil-3\"]""#
        );
    }

    #[test]
    fn test_set_value_dispatches_events() {
        let js = set_value_js("'abc'");
        assert!(js.contains(".set.call(el, 'abc')"));
        assert!(js.contains("new Event('input'"));
        assert!(js.contains("new Event('change'"));
    }

    #[test]
    fn test_found_element_shape() {
        let found: FoundElement =
            serde_json::from_str(r#"{"id":"vigil-1","tag":"button","text":"Add"}"#).unwrap();
        assert_eq!(found.id, "vigil-1");
        assert_eq!(found.tag, "button");
    }

    #[test]
    fn test_only_chrome_no_dialog_reply_means_absent() {
        assert!(reports_no_dialog(&VigilError::driver(
            "handle dialog: Error -32602: No dialog is showing"
        )));
        assert!(!reports_no_dialog(&VigilError::driver(
            "handle dialog: no response within 10000ms"
        )));
        assert!(!reports_no_dialog(&VigilError::driver(
            "handle dialog: Connection closed"
        )));
        assert!(!reports_no_dialog(&VigilError::SessionClosed));
    }
}
