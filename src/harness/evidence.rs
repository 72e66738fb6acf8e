//! Evidence capture seam
//!
//! Screenshot capture and liveness probing go through the [`UiSurface`]
//! trait so the step runner and session can be exercised without a real
//! browser. The Playwright bridge's page handle is the production
//! implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;

use super::error::HarnessError;

/// The UI surface a step runs against: something that can report whether it
/// is still alive and write a full-page screenshot to a path.
#[async_trait]
pub trait UiSurface: Send + Sync {
    /// Whether the page/session has been closed out from under us.
    async fn is_closed(&self) -> bool;

    /// Write a full-page screenshot to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), HarnessError>;
}

/// Outcome suffix used in evidence file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// Build the screenshot path for a step outcome:
/// `<dir>/screenshot-{step}-{outcome}-{timestamp}.png`.
pub fn screenshot_path(dir: &Path, step: &str, outcome: Outcome) -> PathBuf {
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3f");
    dir.join(format!(
        "screenshot-{}-{}-{}.png",
        sanitize_step_name(step),
        outcome.as_str(),
        timestamp
    ))
}

/// Step names become file name components; strip anything hostile.
fn sanitize_step_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Whether an artifact error message indicates the browser died rather than
/// a recoverable capture problem. Matches the messages Playwright emits when
/// the target goes away mid-call.
pub fn implies_session_death(message: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)target closed|browser (has been )?closed|protocol error|sidecar disconnected")
            .expect("session death pattern is valid")
    });
    pattern.is_match(message)
}
