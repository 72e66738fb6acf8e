//! # Scenario Harness
//!
//! A retrying test-execution harness for browser UI scenarios: named steps
//! run with bounded retries and mandatory failure evidence, an aggregator
//! tracks every step's outcome (including the ones that never ran), and a
//! session owns the browser lifecycle plus artifact finalization.
//!
//! ## Layers
//!
//! - **StepRunner** — one fallible action, bounded retries, fixed backoff,
//!   failure screenshots on exhaustion
//! - **ScenarioResultAggregator** — the authoritative result: statuses
//!   evolve `pending -> pass|fail`, leftovers become `not-run`
//! - **ScenarioSession** — browser context (optionally recording video),
//!   evidence directory, result persistence
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scenario_harness::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bridge = Arc::new(PlaywrightBridge::start().await?);
//!     let abort = AbortSignal::new();
//!     let options = SessionOptions::new(7, "contrabass");
//!
//!     let mut session = ScenarioSession::open(bridge, options, abort).await?;
//!     session.seed(["open console", "sign in"]);
//!
//!     session
//!         .run_step("open console", RetryPolicy::default(), |page| async move {
//!             page.goto("https://console.local/login").await?;
//!             Ok(())
//!         })
//!         .await?;
//!
//!     let store = ResultsStore::new("reports");
//!     let result = session.close(&store).await?;
//!     println!("passed: {}", result.passed());
//!     Ok(())
//! }
//! ```
//!
//! Scenarios can also be declared in YAML (`scenario-<id>.yaml`) and run
//! through [`runner::run_scenario`] or the `scenario-harness` CLI.

pub mod bridge;
pub mod harness;
pub mod report;
pub mod runner;
pub mod scenario;

// Re-export main types
pub use bridge::{Bridge, BridgeError, PageHandle, PlaywrightBridge, VideoSpec};
pub use harness::{
    AbortSignal, ErrorInfo, HarnessError, LogEntry, LogLevel, OverallStatus, RetryPolicy,
    ScenarioResult, ScenarioResultAggregator, ScenarioSession, ScreenshotRecord, SessionOptions,
    StepRunner, TestCase, TestStatus, UiSurface,
};
pub use report::{render_summary, ResultsStore, StoreError};
pub use runner::{run_scenario, RunOutcome};
pub use scenario::{
    ActionCategory, BrowserType, LoadError, ParsedAction, RecordingSettings, RetrySpec,
    ScenarioLoader, ScenarioSettings, ScenarioSpec, SettingsError, StepSpec,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bridge::{PageHandle, PlaywrightBridge};
    pub use crate::harness::{
        AbortSignal, HarnessError, RetryPolicy, ScenarioResult, ScenarioResultAggregator,
        ScenarioSession, SessionOptions, StepRunner, TestStatus,
    };
    pub use crate::report::{render_summary, ResultsStore};
    pub use crate::runner::{run_scenario, RunOutcome};
    pub use crate::scenario::{
        BrowserType, RecordingSettings, ScenarioLoader, ScenarioSettings, ScenarioSpec,
    };
}
