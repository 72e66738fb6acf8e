//! Harness error types

use crate::bridge::BridgeError;

/// Errors surfaced by the scenario harness
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A single browser action rejected (selector not found, timeout,
    /// assertion failed). Recovered locally by the step retry loop.
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// All attempts of a step failed.
    #[error("Step '{step}' failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        step: String,
        attempts: u32,
        last_error: String,
    },

    /// The browser or page was closed out-of-band (forced close, crash).
    #[error("Session terminated: {0}")]
    SessionTerminated(String),

    /// An operator or supervisor stopped the run. Distinguished from
    /// [`HarnessError::RetryExhausted`] so reports do not record a genuine
    /// regression.
    #[error("Manually aborted: {0}")]
    ManualAbort(String),

    /// Screenshot/video capture or persistence failed. Non-fatal unless it
    /// implies the session died.
    #[error("Artifact failure: {0}")]
    Artifact(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl HarnessError {
    /// True for errors that mean the browser session is gone and further
    /// steps must not run.
    pub fn is_session_death(&self) -> bool {
        match self {
            HarnessError::SessionTerminated(_) => true,
            HarnessError::Bridge(BridgeError::Disconnected) => true,
            HarnessError::Bridge(BridgeError::ServerError(message)) => {
                super::evidence::implies_session_death(message)
            }
            _ => false,
        }
    }

    /// True when the error came from an operator stop rather than a failure.
    pub fn is_manual_abort(&self) -> bool {
        matches!(self, HarnessError::ManualAbort(_))
    }
}
