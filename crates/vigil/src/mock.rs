//! Scripted in-memory driver.
//!
//! [`TodoAppDriver`] plays the application under test: a login form, then a
//! todo list whose entries carry Edit and Delete buttons, where Edit raises a
//! native prompt. Page changes land after a configurable render latency and
//! dialogs after a configurable delay, so waits and the dialog fallback tier
//! can be exercised without a browser.
//!
//! Supported locator strategies: tag, attribute and text. CSS and XPath fail
//! with `InvalidLocator`.

use crate::capture::encode_png;
use crate::dialog::{Dialog, DialogType};
use crate::driver::{BrowserDriver, ElementHandle, ElementState, PageMetrics};
use crate::locator::{Locator, Strategy};
use crate::result::{VigilError, VigilResult};
use image::{imageops, Rgba, RgbaImage};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::trace;

/// Username the scripted app accepts
pub const VALID_USERNAME: &str = "test";
/// Password the scripted app accepts
pub const VALID_PASSWORD: &str = "test123";

const VIEWPORT: (u32, u32) = (320, 240);
const HEADER_HEIGHT: u32 = 64;
const ROW_HEIGHT: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Login,
    Todos,
}

#[derive(Debug, Clone)]
struct Item {
    key: u64,
    name: String,
}

#[derive(Debug, Clone)]
enum Event {
    ShowTodos,
    AddItem(String),
    RenameItem(u64, String),
    RemoveItem(u64),
    OpenDialog(Dialog, Option<u64>),
}

#[derive(Debug)]
struct OpenDialog {
    dialog: Dialog,
    prompt_text: Option<String>,
    rename_key: Option<u64>,
}

#[derive(Debug)]
struct AppState {
    page: Page,
    url: String,
    username: String,
    password: String,
    new_item: String,
    items: Vec<Item>,
    next_key: u64,
    pending: Vec<(Instant, Event)>,
    dialog: Option<OpenDialog>,
    scroll_y: u32,
    controls_enabled: bool,
    flaky_lookups: u32,
    dialog_failure: Option<String>,
    screenshot_failure: Option<String>,
    closed: bool,
}

impl AppState {
    fn new() -> Self {
        Self {
            page: Page::Login,
            url: "about:blank".to_string(),
            username: String::new(),
            password: String::new(),
            new_item: String::new(),
            items: Vec::new(),
            next_key: 1,
            pending: Vec::new(),
            dialog: None,
            scroll_y: 0,
            controls_enabled: true,
            flaky_lookups: 0,
            dialog_failure: None,
            screenshot_failure: None,
            closed: false,
        }
    }

    fn schedule(&mut self, delay: Duration, event: Event) {
        self.pending.push((Instant::now() + delay, event));
        self.pending.sort_by_key(|(due, _)| *due);
    }

    fn settle(&mut self) {
        let now = Instant::now();
        while self.pending.first().is_some_and(|(due, _)| *due <= now) {
            let (_, event) = self.pending.remove(0);
            trace!(event = ?event, "scripted app event");
            self.apply(event);
        }
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::ShowTodos => {
                self.page = Page::Todos;
                self.username.clear();
                self.password.clear();
                self.scroll_y = 0;
            }
            Event::AddItem(name) => {
                let key = self.next_key;
                self.next_key += 1;
                self.items.push(Item { key, name });
            }
            Event::RenameItem(key, name) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.key == key) {
                    item.name = name;
                }
            }
            Event::RemoveItem(key) => self.items.retain(|i| i.key != key),
            Event::OpenDialog(dialog, rename_key) => {
                self.dialog = Some(OpenDialog {
                    dialog,
                    prompt_text: None,
                    rename_key,
                });
            }
        }
    }

    fn nodes(&self) -> Vec<Node> {
        let enabled = self.controls_enabled;
        let mut nodes = Vec::new();
        match self.page {
            Page::Login => {
                nodes.push(Node::new("title", "h1", "Login"));
                nodes.push(
                    Node::new("username", "input", "")
                        .attr("placeholder", "Username")
                        .enabled(enabled),
                );
                nodes.push(
                    Node::new("password", "input", "")
                        .attr("placeholder", "Password")
                        .attr("type", "password")
                        .enabled(enabled),
                );
                nodes.push(Node::new("login", "button", "Login").enabled(enabled));
            }
            Page::Todos => {
                nodes.push(Node::new("title", "h1", "Todo List"));
                nodes.push(
                    Node::new("new-item", "input", "")
                        .attr("placeholder", "New item")
                        .enabled(enabled),
                );
                nodes.push(Node::new("add", "button", "Add").enabled(enabled));
                nodes.push(Node::new("list", "ul", ""));
                for item in &self.items {
                    let li = format!("item-{}", item.key);
                    nodes.push(Node::new(&li, "li", &item.name).child_of("list"));
                    nodes.push(
                        Node::new(&format!("edit-{}", item.key), "button", "Edit")
                            .child_of(&li)
                            .enabled(enabled),
                    );
                    nodes.push(
                        Node::new(&format!("delete-{}", item.key), "button", "Delete")
                            .child_of(&li)
                            .enabled(enabled),
                    );
                }
            }
        }
        nodes
    }

    fn blocked(&self) -> VigilResult<()> {
        if self.closed {
            return Err(VigilError::SessionClosed);
        }
        match &self.dialog {
            Some(open) => Err(open.dialog.blocking_error()),
            None => Ok(()),
        }
    }

    fn content_height(&self, viewport_height: u32) -> u32 {
        let rows = match self.page {
            Page::Login => 0,
            Page::Todos => self.items.len() as u32,
        };
        (HEADER_HEIGHT + rows * ROW_HEIGHT).max(viewport_height)
    }
}

#[derive(Debug, Clone)]
struct Node {
    id: String,
    tag: &'static str,
    text: String,
    attrs: Vec<(&'static str, String)>,
    parent: Option<String>,
    enabled: bool,
}

impl Node {
    fn new(id: &str, tag: &'static str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            tag,
            text: text.to_string(),
            attrs: Vec::new(),
            parent: None,
            enabled: true,
        }
    }

    fn attr(mut self, name: &'static str, value: &str) -> Self {
        self.attrs.push((name, value.to_string()));
        self
    }

    fn child_of(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn handle(&self) -> ElementHandle {
        ElementHandle::new(&self.id, self.tag).with_text(&self.text)
    }
}

fn is_descendant(nodes: &[Node], node: &Node, ancestor_id: &str) -> bool {
    let mut current = node.parent.as_deref();
    while let Some(id) = current {
        if id == ancestor_id {
            return true;
        }
        current = nodes
            .iter()
            .find(|n| n.id == id)
            .and_then(|n| n.parent.as_deref());
    }
    false
}

fn matching<'a>(nodes: &'a [Node], locator: &Locator) -> VigilResult<Vec<&'a Node>> {
    if matches!(locator.strategy, Strategy::Css | Strategy::XPath) {
        return Err(VigilError::InvalidLocator {
            locator: locator.to_string(),
            message: "scripted driver resolves tag, attribute and text locators only".to_string(),
        });
    }
    let parents = match &locator.parent {
        Some(parent) => Some(matching(nodes, parent)?),
        None => None,
    };
    let mut found = Vec::new();
    for node in nodes {
        let strategy_match = match locator.strategy {
            Strategy::TagName => node.tag.eq_ignore_ascii_case(&locator.selector),
            Strategy::TextContent => node.text.contains(locator.selector.as_str()),
            Strategy::Attribute => locator.attribute_parts().is_some_and(|(name, value)| {
                node.attrs.iter().any(|(n, v)| *n == name && v == value)
            }),
            Strategy::Css | Strategy::XPath => false,
        };
        let text_match = locator.text.as_ref().map_or(true, |t| t.matches(&node.text));
        let scope_match = parents.as_ref().map_or(true, |ps| {
            ps.iter().any(|p| is_descendant(nodes, node, &p.id))
        });
        if strategy_match && text_match && scope_match {
            found.push(node);
        }
    }
    Ok(found)
}

/// Stable 24-bit color derived from a label
fn label_color(label: &str) -> Rgba<u8> {
    let hash = label
        .bytes()
        .fold(0x811c_9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
    let [r, g, b, _] = hash.to_le_bytes();
    Rgba([r, g, b, 255])
}

/// In-memory todo application behind the [`BrowserDriver`] seam
#[derive(Debug)]
pub struct TodoAppDriver {
    state: Arc<Mutex<AppState>>,
    render_latency: Duration,
    dialog_delay: Duration,
    dialog_observable: bool,
    viewport: (u32, u32),
    device_scale: u32,
}

impl Default for TodoAppDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TodoAppDriver {
    /// Fresh app showing the login form, no latency
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::new())),
            render_latency: Duration::ZERO,
            dialog_delay: Duration::ZERO,
            dialog_observable: true,
            viewport: VIEWPORT,
            device_scale: 1,
        }
    }

    /// Already logged in, list pre-populated
    #[must_use]
    pub fn logged_in_with_items(items: &[&str]) -> Self {
        let driver = Self::new();
        if let Ok(mut state) = driver.state.lock() {
            state.page = Page::Todos;
            for name in items {
                state.apply(Event::AddItem((*name).to_string()));
            }
        }
        driver
    }

    /// Delay between an action and the page change it causes
    #[must_use]
    pub const fn with_render_latency(mut self, latency: Duration) -> Self {
        self.render_latency = latency;
        self
    }

    /// Delay between an action and the dialog it raises
    #[must_use]
    pub const fn with_dialog_delay(mut self, delay: Duration) -> Self {
        self.dialog_delay = delay;
        self
    }

    /// When false, open dialogs are invisible to `active_dialog` but can
    /// still be accepted or dismissed
    #[must_use]
    pub const fn with_dialog_observable(mut self, observable: bool) -> Self {
        self.dialog_observable = observable;
        self
    }

    /// The first `count` element lookups fail with a transient error
    #[must_use]
    pub fn with_flaky_lookups(self, count: u32) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.flaky_lookups = count;
        }
        self
    }

    /// Device pixels per CSS pixel in screenshots
    #[must_use]
    pub fn with_device_scale(mut self, scale: u32) -> Self {
        self.device_scale = scale.max(1);
        self
    }

    /// CSS viewport size
    #[must_use]
    pub const fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Enable or disable every input and button
    pub fn set_controls_enabled(&mut self, enabled: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.controls_enabled = enabled;
        }
    }

    /// Make dialog commands fail with a non-transient driver error
    pub fn fail_dialog_commands(&mut self, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.dialog_failure = Some(message.to_string());
        }
    }

    /// Make screenshots fail with a non-transient driver error
    pub fn fail_screenshots(&mut self, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.screenshot_failure = Some(message.to_string());
        }
    }

    /// Submit the login form directly
    pub fn login_now(&mut self, username: &str, password: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.settle();
            username.clone_into(&mut state.username);
            password.clone_into(&mut state.password);
            self.submit_login(&mut state);
        }
    }

    /// Press the Edit button of `item` directly
    pub fn click_edit_now(&mut self, item: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.settle();
            let found = state.items.iter().find(|i| i.name == item).cloned();
            if let Some(item) = found {
                self.open_edit_prompt(&mut state, &item);
            }
        }
    }

    /// Dialog state regardless of observability
    #[must_use]
    pub fn active_dialog_unchecked(&self) -> Option<Dialog> {
        let mut state = self.state.lock().ok()?;
        state.settle();
        state.dialog.as_ref().map(|open| open.dialog.clone())
    }

    /// Shared view of the app that survives handing the driver to a session
    #[must_use]
    pub fn observer(&self) -> AppObserver {
        AppObserver {
            state: Arc::clone(&self.state),
        }
    }

    /// Whole document rendered at device scale
    #[must_use]
    pub fn render_full_page(&self) -> RgbaImage {
        match self.state.lock() {
            Ok(mut state) => {
                state.settle();
                self.render(&state)
            }
            Err(_) => RgbaImage::new(0, 0),
        }
    }

    fn state(&self) -> VigilResult<MutexGuard<'_, AppState>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| VigilError::driver("scripted app state poisoned"))?;
        state.settle();
        Ok(state)
    }

    fn submit_login(&self, state: &mut AppState) {
        if state.username == VALID_USERNAME && state.password == VALID_PASSWORD {
            state.schedule(self.render_latency, Event::ShowTodos);
        } else {
            state.schedule(
                self.dialog_delay,
                Event::OpenDialog(Dialog::alert("Login failed"), None),
            );
        }
    }

    fn open_edit_prompt(&self, state: &mut AppState, item: &Item) {
        state.schedule(
            self.dialog_delay,
            Event::OpenDialog(
                Dialog::prompt("Edit item:", Some(item.name.clone())),
                Some(item.key),
            ),
        );
    }

    fn render(&self, state: &AppState) -> RgbaImage {
        let (width, viewport_height) = self.viewport;
        let height = state.content_height(viewport_height);
        let header = match state.page {
            Page::Login => Rgba([52, 73, 94, 255]),
            Page::Todos => Rgba([39, 174, 96, 255]),
        };
        let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        for y in 0..HEADER_HEIGHT.min(height) {
            for x in 0..width {
                img.put_pixel(x, y, header);
            }
        }
        if state.page == Page::Todos {
            for (row, item) in state.items.iter().enumerate() {
                let top = HEADER_HEIGHT + row as u32 * ROW_HEIGHT;
                let bar = (16 + 6 * item.name.len() as u32).min(width);
                let color = label_color(&item.name);
                for y in top + 4..top + ROW_HEIGHT - 4 {
                    for x in 8..bar {
                        img.put_pixel(x, y, color);
                    }
                }
            }
        }
        if self.device_scale > 1 {
            img = imageops::resize(
                &img,
                width * self.device_scale,
                height * self.device_scale,
                imageops::FilterType::Nearest,
            );
        }
        img
    }

    fn find_node(state: &AppState, element: &ElementHandle) -> VigilResult<Node> {
        state
            .nodes()
            .into_iter()
            .find(|n| n.id == element.id)
            .ok_or_else(|| VigilError::StaleElement {
                id: element.id.clone(),
            })
    }
}

impl BrowserDriver for TodoAppDriver {
    fn navigate(&mut self, url: &str) -> VigilResult<()> {
        let mut state = self.state()?;
        if state.closed {
            return Err(VigilError::SessionClosed);
        }
        url.clone_into(&mut state.url);
        state.page = Page::Login;
        state.pending.clear();
        state.dialog = None;
        state.username.clear();
        state.password.clear();
        state.new_item.clear();
        state.scroll_y = 0;
        Ok(())
    }

    fn current_url(&self) -> VigilResult<String> {
        let state = self.state()?;
        if state.closed {
            return Err(VigilError::SessionClosed);
        }
        Ok(state.url.clone())
    }

    fn find_element(&self, locator: &Locator) -> VigilResult<Option<ElementHandle>> {
        let mut state = self.state()?;
        state.blocked()?;
        if state.flaky_lookups > 0 {
            state.flaky_lookups -= 1;
            return Err(VigilError::transient("execution context was destroyed"));
        }
        let nodes = state.nodes();
        Ok(matching(&nodes, locator)?.first().map(|n| n.handle()))
    }

    fn element_state(&self, element: &ElementHandle) -> VigilResult<ElementState> {
        let state = self.state()?;
        state.blocked()?;
        let node = Self::find_node(&state, element)?;
        Ok(ElementState {
            visible: true,
            enabled: node.enabled,
            text: node.text,
        })
    }

    fn clear(&mut self, element: &ElementHandle) -> VigilResult<()> {
        let mut state = self.state()?;
        state.blocked()?;
        let node = Self::find_node(&state, element)?;
        match node.id.as_str() {
            "username" => state.username.clear(),
            "password" => state.password.clear(),
            "new-item" => state.new_item.clear(),
            _ => return Err(VigilError::driver(format!("<{}> is not editable", node.tag))),
        }
        Ok(())
    }

    fn send_keys(&mut self, element: &ElementHandle, text: &str) -> VigilResult<()> {
        let mut state = self.state()?;
        state.blocked()?;
        let node = Self::find_node(&state, element)?;
        if !node.enabled {
            return Ok(());
        }
        match node.id.as_str() {
            "username" => state.username.push_str(text),
            "password" => state.password.push_str(text),
            "new-item" => state.new_item.push_str(text),
            _ => return Err(VigilError::driver(format!("<{}> is not editable", node.tag))),
        }
        Ok(())
    }

    fn click(&mut self, element: &ElementHandle) -> VigilResult<()> {
        let mut state = self.state()?;
        state.blocked()?;
        let node = Self::find_node(&state, element)?;
        if !node.enabled {
            return Ok(());
        }
        let id = node.id.as_str();
        if id == "login" {
            self.submit_login(&mut state);
        } else if id == "add" {
            let name = std::mem::take(&mut state.new_item);
            if !name.trim().is_empty() {
                state.schedule(self.render_latency, Event::AddItem(name));
            }
        } else if let Some(key) = id.strip_prefix("edit-").and_then(|k| k.parse::<u64>().ok()) {
            let item = state.items.iter().find(|i| i.key == key).cloned();
            if let Some(item) = item {
                self.open_edit_prompt(&mut state, &item);
            }
        } else if let Some(key) = id.strip_prefix("delete-").and_then(|k| k.parse::<u64>().ok()) {
            state.schedule(self.render_latency, Event::RemoveItem(key));
        }
        Ok(())
    }

    fn page_text(&self) -> VigilResult<String> {
        let state = self.state()?;
        state.blocked()?;
        let lines: Vec<String> = state
            .nodes()
            .into_iter()
            .filter(|n| !n.text.is_empty())
            .map(|n| n.text)
            .collect();
        Ok(lines.join("\n"))
    }

    fn active_dialog(&self) -> VigilResult<Option<Dialog>> {
        let state = self.state()?;
        if state.closed {
            return Err(VigilError::SessionClosed);
        }
        if !self.dialog_observable {
            return Ok(None);
        }
        Ok(state.dialog.as_ref().map(|open| open.dialog.clone()))
    }

    fn send_dialog_text(&mut self, text: &str) -> VigilResult<()> {
        let mut state = self.state()?;
        if let Some(message) = &state.dialog_failure {
            return Err(VigilError::driver(message.clone()));
        }
        match state.dialog.as_mut() {
            Some(open) if open.dialog.dialog_type() == DialogType::Prompt => {
                open.prompt_text = Some(text.to_string());
                Ok(())
            }
            Some(_) => Err(VigilError::driver("open dialog does not accept text")),
            None => Err(VigilError::NoDialog),
        }
    }

    fn accept_dialog(&mut self) -> VigilResult<Dialog> {
        let mut state = self.state()?;
        if let Some(message) = &state.dialog_failure {
            return Err(VigilError::driver(message.clone()));
        }
        let open = state.dialog.take().ok_or(VigilError::NoDialog)?;
        if let Some(key) = open.rename_key {
            let name = open
                .prompt_text
                .or_else(|| open.dialog.default_value().map(str::to_string))
                .unwrap_or_default();
            state.schedule(self.render_latency, Event::RenameItem(key, name));
        }
        Ok(open.dialog)
    }

    fn dismiss_dialog(&mut self) -> VigilResult<Dialog> {
        let mut state = self.state()?;
        if let Some(message) = &state.dialog_failure {
            return Err(VigilError::driver(message.clone()));
        }
        let open = state.dialog.take().ok_or(VigilError::NoDialog)?;
        Ok(open.dialog)
    }

    fn page_metrics(&self) -> VigilResult<PageMetrics> {
        let state = self.state()?;
        if state.closed {
            return Err(VigilError::SessionClosed);
        }
        Ok(PageMetrics {
            viewport_width: self.viewport.0,
            viewport_height: self.viewport.1,
            content_height: state.content_height(self.viewport.1),
            scroll_y: state.scroll_y,
        })
    }

    fn scroll_to(&mut self, y: u32) -> VigilResult<u32> {
        let mut state = self.state()?;
        if state.closed {
            return Err(VigilError::SessionClosed);
        }
        let max = state.content_height(self.viewport.1) - self.viewport.1;
        state.scroll_y = y.min(max);
        Ok(state.scroll_y)
    }

    fn screenshot_png(&mut self) -> VigilResult<Vec<u8>> {
        let state = self.state()?;
        if state.closed {
            return Err(VigilError::SessionClosed);
        }
        if let Some(message) = &state.screenshot_failure {
            return Err(VigilError::driver(message.clone()));
        }
        let full = self.render(&state);
        let scale = self.device_scale;
        let tile = imageops::crop_imm(
            &full,
            0,
            state.scroll_y * scale,
            self.viewport.0 * scale,
            self.viewport.1 * scale,
        )
        .to_image();
        encode_png(&tile)
    }

    fn close(&mut self) -> VigilResult<()> {
        let mut state = self.state()?;
        state.closed = true;
        state.pending.clear();
        state.dialog = None;
        Ok(())
    }
}

/// Read-only window into a [`TodoAppDriver`]'s state
#[derive(Debug, Clone)]
pub struct AppObserver {
    state: Arc<Mutex<AppState>>,
}

impl AppObserver {
    /// Current item labels in list order
    #[must_use]
    pub fn items(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|mut s| {
                s.settle();
                s.items.iter().map(|i| i.name.clone()).collect()
            })
            .unwrap_or_default()
    }

    /// Whether the todo view is showing
    #[must_use]
    pub fn on_todo_page(&self) -> bool {
        self.state
            .lock()
            .map(|mut s| {
                s.settle();
                s.page == Page::Todos
            })
            .unwrap_or(false)
    }

    /// Whether the driver was closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(false)
    }
}
