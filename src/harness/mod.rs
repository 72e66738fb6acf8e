//! The test-execution harness
//!
//! Three layers: [`retry::StepRunner`] executes one step with bounded
//! retries, [`aggregator::ScenarioResultAggregator`] owns the evolving
//! result, and [`session::ScenarioSession`] ties both to a browser session
//! and its evidence artifacts.

pub mod abort;
pub mod aggregator;
pub mod error;
pub mod evidence;
pub mod retry;
pub mod session;

pub use abort::AbortSignal;
pub use aggregator::{
    ErrorInfo, LogEntry, LogLevel, OverallStatus, ScenarioResult, ScenarioResultAggregator,
    ScreenshotRecord, TestCase, TestStatus,
};
pub use error::HarnessError;
pub use evidence::{implies_session_death, screenshot_path, Outcome, UiSurface};
pub use retry::{RetryPolicy, StepRunner};
pub use session::{ScenarioSession, SessionOptions};
