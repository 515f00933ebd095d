//! Todo-list regression scenario.
//!
//! Invalid login, valid login, create, edit through the native prompt, delete.
//! Checkpoints take full-page captures and compare them with stored baselines.

use crate::capture::CaptureMode;
use crate::condition::Condition;
use crate::dialog::DialogMode;
use crate::locator::Locator;
use crate::scenario::{Scenario, Step};
use serde::{Deserialize, Serialize};

/// Locators for the todo application
#[derive(Debug, Clone, Copy)]
pub struct TodoAppLocators;

impl TodoAppLocators {
    /// Login form username field
    #[must_use]
    pub fn username_input() -> Locator {
        Locator::attribute("placeholder", "Username")
    }

    /// Login form password field
    #[must_use]
    pub fn password_input() -> Locator {
        Locator::attribute("placeholder", "Password")
    }

    /// Login form submit button
    #[must_use]
    pub fn login_button() -> Locator {
        Locator::tag("button").with_exact_text("Login")
    }

    /// New item field
    #[must_use]
    pub fn new_item_input() -> Locator {
        Locator::attribute("placeholder", "New item")
    }

    /// Add button
    #[must_use]
    pub fn add_button() -> Locator {
        Locator::tag("button").with_exact_text("Add")
    }

    /// List entry whose label contains `item`
    #[must_use]
    pub fn item(item: &str) -> Locator {
        Locator::tag("li").with_text(item)
    }

    /// Edit button next to `item`
    #[must_use]
    pub fn edit_button_for(item: &str) -> Locator {
        Locator::tag("button")
            .with_exact_text("Edit")
            .within(Self::item(item))
    }

    /// Delete button next to `item`
    #[must_use]
    pub fn delete_button_for(item: &str) -> Locator {
        Locator::tag("button")
            .with_exact_text("Delete")
            .within(Self::item(item))
    }
}

/// Inputs of the todo scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoScenarioConfig {
    /// Accepted username
    pub username: String,
    /// Accepted password
    pub password: String,
    /// Rejected username
    pub invalid_username: String,
    /// Rejected password
    pub invalid_password: String,
    /// Item to create
    pub item: String,
    /// New label given through the edit prompt
    pub updated_item: String,
    /// Capture mode at checkpoints
    pub checkpoint_mode: CaptureMode,
    /// Add a baseline comparison after each checkpoint
    pub compare_baselines: bool,
}

impl Default for TodoScenarioConfig {
    fn default() -> Self {
        Self {
            username: "test".to_string(),
            password: "test123".to_string(),
            invalid_username: "wrong".to_string(),
            invalid_password: "wrong".to_string(),
            item: "Test Item".to_string(),
            updated_item: "Test Item Updated".to_string(),
            checkpoint_mode: CaptureMode::FullPage,
            compare_baselines: true,
        }
    }
}

impl TodoScenarioConfig {
    /// Skip baseline comparisons
    #[must_use]
    pub const fn without_baselines(mut self) -> Self {
        self.compare_baselines = false;
        self
    }

    fn checkpoint(&self, name: &str) -> Vec<Step> {
        let mut steps = vec![Step::capture(name, self.checkpoint_mode)];
        if self.compare_baselines {
            let baseline = name.trim_start_matches(|c: char| c.is_ascii_digit() || c == '_');
            steps.push(Step::compare_baseline(baseline));
        }
        steps
    }
}

/// Scenario name
pub const TODO_SCENARIO_NAME: &str = "todo_regression";

/// The todo regression scenario
#[must_use]
pub fn todo_regression_scenario(config: &TodoScenarioConfig) -> Scenario {
    let item = config.item.as_str();
    let updated = config.updated_item.as_str();

    Scenario::new(TODO_SCENARIO_NAME)
        .step(Step::navigate("open app", "/"))
        .step(Step::wait_for(
            "login form shown",
            Condition::ElementPresent(TodoAppLocators::username_input()),
        ))
        .steps(config.checkpoint("01_login_page"))
        // Rejected login reports through an alert and stays on the form.
        .step(Step::fill(
            "enter invalid username",
            TodoAppLocators::username_input(),
            &config.invalid_username,
        ))
        .step(Step::fill(
            "enter invalid password",
            TodoAppLocators::password_input(),
            &config.invalid_password,
        ))
        .step(Step::click("submit invalid login", TodoAppLocators::login_button()))
        .step(Step::resolve_dialog("acknowledge login error", DialogMode::Accept, None).non_fatal())
        .step(Step::wait_for("login rejected", Condition::text_present("Login")))
        .step(Step::navigate("reload app", "/"))
        .step(Step::fill("enter username", TodoAppLocators::username_input(), &config.username))
        .step(Step::fill("enter password", TodoAppLocators::password_input(), &config.password))
        .step(Step::click("submit login", TodoAppLocators::login_button()))
        .step(Step::wait_for("todo list shown", Condition::text_present("Todo List")))
        .steps(config.checkpoint("02_todo_list"))
        .step(Step::fill("enter new item", TodoAppLocators::new_item_input(), item))
        .step(Step::click("add item", TodoAppLocators::add_button()))
        .step(Step::wait_for("item created", Condition::ElementPresent(TodoAppLocators::item(item))))
        .steps(config.checkpoint("03_item_created"))
        .step(Step::click("edit item", TodoAppLocators::edit_button_for(item)))
        .step(Step::resolve_dialog("rename item", DialogMode::Accept, Some(updated)))
        .step(Step::wait_for("item renamed", Condition::text_present(updated)))
        .step(Step::wait_for(
            "old label gone",
            Condition::TextAbsent {
                text: item.to_string(),
                within: Some(Locator::tag("li").with_exact_text(item)),
            },
        ))
        .steps(config.checkpoint("04_item_edited"))
        .step(Step::click("delete item", TodoAppLocators::delete_button_for(updated)))
        .step(Step::wait_for("item deleted", Condition::text_absent(updated)))
        .steps(config.checkpoint("05_item_deleted"))
}
