//! Action parsing and execution
//!
//! Steps name their action in the `uses` field as `category/action`
//! (`page/goto`, `element/click`, `wait/selector`, ...). The parser
//! categorizes; [`execute`] dispatches against a page handle and returns any
//! outputs the action produced.

use std::collections::HashMap;

use crate::bridge::PageHandle;
use crate::harness::error::HarnessError;

/// Categories of actions available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Page,    // page/goto, page/reload, etc.
    Element, // element/click, element/fill, etc.
    Wait,    // wait/selector, wait/timeout, etc.
    Assert,  // assert/visible, assert/text_contains, etc.
    Fail,    // fail/now - always fails (for testing)
}

/// Parsed action from the "uses" field
#[derive(Debug, Clone)]
pub struct ParsedAction {
    pub category: ActionCategory,
    pub action: String,
}

impl ParsedAction {
    /// Parse an action string like "page/goto" into category and action
    pub fn parse(uses: &str) -> Result<Self, HarnessError> {
        let parts: Vec<&str> = uses.split('/').collect();
        if parts.len() != 2 {
            return Err(HarnessError::UnknownAction(format!(
                "Invalid action format '{uses}'. Expected 'category/action'"
            )));
        }

        let category = match parts[0] {
            "page" => ActionCategory::Page,
            "element" => ActionCategory::Element,
            "wait" => ActionCategory::Wait,
            "assert" => ActionCategory::Assert,
            "fail" => ActionCategory::Fail,
            other => {
                return Err(HarnessError::UnknownAction(format!(
                    "Unknown action category: {other}"
                )))
            }
        };

        Ok(Self {
            category,
            action: parts[1].to_string(),
        })
    }
}

fn required<'a>(
    params: &'a HashMap<String, String>,
    key: &str,
) -> Result<&'a String, HarnessError> {
    params
        .get(key)
        .ok_or_else(|| HarnessError::MissingParameter(key.to_string()))
}

/// Execute a parsed action against a page. Returns action outputs (URL,
/// title, element text) keyed by name.
pub async fn execute(
    page: &PageHandle,
    action: &ParsedAction,
    params: &HashMap<String, String>,
) -> Result<HashMap<String, String>, HarnessError> {
    match action.category {
        ActionCategory::Page => execute_page_action(page, &action.action, params).await,
        ActionCategory::Element => execute_element_action(page, &action.action, params).await,
        ActionCategory::Wait => execute_wait_action(page, &action.action, params).await,
        ActionCategory::Assert => execute_assert(page, &action.action, params).await,
        ActionCategory::Fail => {
            let message = params
                .get("message")
                .map(|v| v.as_str())
                .unwrap_or("Intentional failure");
            Err(HarnessError::ActionFailed(message.to_string()))
        }
    }
}

async fn execute_page_action(
    page: &PageHandle,
    action: &str,
    params: &HashMap<String, String>,
) -> Result<HashMap<String, String>, HarnessError> {
    let mut outputs = HashMap::new();

    match action {
        "goto" => {
            let url = required(params, "url")?;
            page.goto(url).await?;
        }
        "reload" => {
            page.reload().await?;
        }
        "url" => {
            let url = page.url().await?;
            outputs.insert("url".to_string(), url);
        }
        "title" => {
            let title = page.title().await?;
            outputs.insert("title".to_string(), title);
        }
        _ => return Err(HarnessError::UnknownAction(format!("page/{action}"))),
    }

    Ok(outputs)
}

async fn execute_element_action(
    page: &PageHandle,
    action: &str,
    params: &HashMap<String, String>,
) -> Result<HashMap<String, String>, HarnessError> {
    let selector = required(params, "selector")?;

    let mut outputs = HashMap::new();

    match action {
        "click" => {
            page.click(selector).await?;
        }
        "fill" => {
            let value = required(params, "value")?;
            page.fill(selector, value).await?;
        }
        "type" => {
            let text = required(params, "text")?;
            let delay = params.get("delay").and_then(|d| d.parse().ok());
            page.type_text(selector, text, delay).await?;
        }
        "select" => {
            let value = required(params, "value")?;
            page.select(selector, value).await?;
        }
        "hover" => {
            page.hover(selector).await?;
        }
        "text" => {
            let text = page.text(selector).await?;
            outputs.insert("text".to_string(), text);
        }
        _ => return Err(HarnessError::UnknownAction(format!("element/{action}"))),
    }

    Ok(outputs)
}

async fn execute_wait_action(
    page: &PageHandle,
    action: &str,
    params: &HashMap<String, String>,
) -> Result<HashMap<String, String>, HarnessError> {
    let timeout = params.get("timeout").and_then(|t| t.parse().ok());

    match action {
        "selector" => {
            let selector = required(params, "selector")?;
            page.wait_for_selector(selector, timeout).await?;
        }
        "detached" => {
            let selector = required(params, "selector")?;
            page.wait_for_detached(selector, timeout).await?;
        }
        "navigation" => {
            page.wait_for_navigation(timeout).await?;
        }
        "url" => {
            let pattern = required(params, "pattern")?;
            page.wait_for_url(pattern, timeout).await?;
        }
        "timeout" => {
            let ms = required(params, "ms")?
                .parse::<u64>()
                .map_err(|_| HarnessError::MissingParameter("ms must be a number".to_string()))?;
            tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
        }
        _ => return Err(HarnessError::UnknownAction(format!("wait/{action}"))),
    }

    Ok(HashMap::new())
}

async fn execute_assert(
    page: &PageHandle,
    action: &str,
    params: &HashMap<String, String>,
) -> Result<HashMap<String, String>, HarnessError> {
    match action {
        "visible" => {
            let selector = required(params, "selector")?;
            let visible = page.is_visible(selector).await?;
            if !visible {
                return Err(HarnessError::AssertionFailed(format!(
                    "Element '{selector}' is not visible"
                )));
            }
        }
        "hidden" => {
            let selector = required(params, "selector")?;
            let visible = page.is_visible(selector).await?;
            if visible {
                return Err(HarnessError::AssertionFailed(format!(
                    "Element '{selector}' is visible but expected hidden"
                )));
            }
        }
        "text_contains" => {
            let selector = required(params, "selector")?;
            let expected = required(params, "text")?;
            let actual = page.text(selector).await?;
            if !actual.contains(expected) {
                return Err(HarnessError::AssertionFailed(format!(
                    "Text '{actual}' does not contain '{expected}'"
                )));
            }
        }
        "url_contains" => {
            let pattern = required(params, "pattern")?;
            let url = page.url().await?;
            if !url.contains(pattern) {
                return Err(HarnessError::AssertionFailed(format!(
                    "URL '{url}' does not contain '{pattern}'"
                )));
            }
        }
        "title_is" => {
            let expected = required(params, "title")?;
            let actual = page.title().await?;
            if &actual != expected {
                return Err(HarnessError::AssertionFailed(format!(
                    "Title '{actual}' does not match '{expected}'"
                )));
            }
        }
        _ => return Err(HarnessError::UnknownAction(format!("assert/{action}"))),
    }

    Ok(HashMap::new())
}
