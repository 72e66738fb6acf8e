//! Bounded-retry execution of a single step
//!
//! The step runner attempts one fallible, possibly flaky browser action a
//! bounded number of times with a fixed backoff between attempts. On
//! exhaustion it captures failure evidence (when a UI surface is attached)
//! and raises an aggregated error; an operator stop is reported as
//! [`HarnessError::ManualAbort`] instead so it is never mistaken for a
//! genuine regression.
//!
//! Retried operations are re-invoked as-is with no rollback in between, so
//! callers must hand in idempotent actions (or pass a `verify` that probes
//! for "already done" before acting again). This is a documented
//! precondition, not something the runner can enforce.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use super::abort::AbortSignal;
use super::error::HarnessError;
use super::evidence::{screenshot_path, Outcome, UiSurface};

/// Retry bounds for one step. Backoff is fixed, not exponential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// No retry: capture-and-raise on first failure.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Executes single steps under a [`RetryPolicy`].
pub struct StepRunner<'a> {
    abort: AbortSignal,
    surface: Option<&'a dyn UiSurface>,
    evidence_dir: Option<PathBuf>,
}

impl<'a> StepRunner<'a> {
    pub fn new(abort: AbortSignal) -> Self {
        Self {
            abort,
            surface: None,
            evidence_dir: None,
        }
    }

    /// Attach a UI surface so exhausted retries leave a failure screenshot
    /// behind in `evidence_dir`.
    pub fn with_surface(mut self, surface: &'a dyn UiSurface, evidence_dir: PathBuf) -> Self {
        self.surface = Some(surface);
        self.evidence_dir = Some(evidence_dir);
        self
    }

    /// Run `op` until it succeeds or the policy is exhausted.
    pub async fn run_with_retry<T, F, Fut>(
        &self,
        name: &str,
        policy: RetryPolicy,
        op: F,
    ) -> Result<T, HarnessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        self.run_with_retry_verified(name, policy, op, |_: &T| async { Ok(true) })
            .await
    }

    /// Like [`StepRunner::run_with_retry`], but an attempt only counts as a
    /// success when `verify` approves the result. A `verify` that errors
    /// counts as a failed attempt, same as a thrown operation.
    pub async fn run_with_retry_verified<T, F, Fut, V, VFut>(
        &self,
        name: &str,
        policy: RetryPolicy,
        mut op: F,
        verify: V,
    ) -> Result<T, HarnessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarnessError>>,
        V: Fn(&T) -> VFut,
        VFut: Future<Output = Result<bool, HarnessError>>,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error: Option<HarnessError> = None;

        for attempt in 1..=max_attempts {
            info!(step = name, attempt, max_attempts, "attempt");

            match op().await {
                Ok(result) => match verify(&result).await {
                    Ok(true) => {
                        info!(step = name, attempt, max_attempts, "step succeeded");
                        return Ok(result);
                    }
                    Ok(false) => {
                        warn!(step = name, attempt, "verification rejected result");
                        last_error = Some(HarnessError::ActionFailed(format!(
                            "{name}: verification rejected result"
                        )));
                    }
                    Err(e) => {
                        warn!(step = name, attempt, error = %e, "verification errored");
                        last_error = Some(e);
                    }
                },
                Err(e) if e.is_session_death() => {
                    // The browser is gone; further attempts would only run
                    // against a dead session.
                    warn!(step = name, attempt, error = %e, "session died mid-step");
                    self.capture_exhaustion_evidence(name).await;
                    return Err(HarnessError::SessionTerminated(e.to_string()));
                }
                Err(e) => {
                    warn!(step = name, attempt, max_attempts, error = %e, "attempt failed");
                    last_error = Some(e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(policy.backoff).await;
            }
        }

        self.capture_exhaustion_evidence(name).await;

        let last_message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());

        if self.abort.is_raised() {
            let reason = self.abort.reason().unwrap_or_else(|| "operator stop".to_string());
            warn!(step = name, reason = %reason, "step abandoned by manual abort");
            return Err(HarnessError::ManualAbort(format!(
                "{name} abandoned after {max_attempts} attempts: {reason}"
            )));
        }

        warn!(step = name, max_attempts, "all attempts failed");
        Err(HarnessError::RetryExhausted {
            step: name.to_string(),
            attempts: max_attempts,
            last_error: last_message,
        })
    }

    /// Best-effort failure screenshot once a step is out of attempts.
    async fn capture_exhaustion_evidence(&self, name: &str) {
        let (Some(surface), Some(dir)) = (self.surface, self.evidence_dir.as_ref()) else {
            return;
        };

        if surface.is_closed().await {
            warn!(step = name, "surface already closed, skipping failure screenshot");
            return;
        }

        let path = screenshot_path(dir, name, Outcome::Failure);
        match surface.screenshot(&path).await {
            Ok(()) => info!(step = name, path = %path.display(), "failure screenshot captured"),
            Err(e) => warn!(step = name, error = %e, "failure screenshot capture failed"),
        }
    }
}
