//! Scenario session lifecycle
//!
//! A session owns the resources around one scenario run: the browser
//! context (optionally recording video), the page, the result aggregator,
//! and the evidence directory. Domain steps run through [`ScenarioSession::run_step`],
//! which binds the step runner's retry loop to the aggregator's bookkeeping
//! and captures an outcome screenshot on both paths.
//!
//! Callers must reach [`ScenarioSession::close`] whether steps succeeded or
//! raised; close tears the context down, finalizes artifacts, and persists
//! the result.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};

use crate::bridge::{PageHandle, PlaywrightBridge, VideoSpec};
use crate::report::ResultsStore;
use crate::scenario::BrowserType;

use super::abort::AbortSignal;
use super::aggregator::{ErrorInfo, LogLevel, ScenarioResult, ScenarioResultAggregator};
use super::error::HarnessError;
use super::evidence::{implies_session_death, screenshot_path, Outcome, UiSurface};
use super::retry::{RetryPolicy, StepRunner};

/// Options for one scenario session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub scenario_id: u32,
    pub product: String,
    pub browser: BrowserType,
    pub headless: bool,
    /// Root of the evidence tree; this session writes under
    /// `<reports_dir>/scenario-<id>/`.
    pub reports_dir: PathBuf,
    pub record_video: bool,
    /// Where the recorder drops raw video files before finalization.
    pub video_dir: PathBuf,
    /// Optional destination a finished recording is copied to (best effort).
    pub user_video_folder: Option<PathBuf>,
    /// UI-settle delay before a success screenshot.
    pub success_settle: Duration,
    /// Shorter settle before a failure screenshot, so the failure state is
    /// captured before it changes.
    pub failure_settle: Duration,
}

impl SessionOptions {
    pub fn new(scenario_id: u32, product: impl Into<String>) -> Self {
        Self {
            scenario_id,
            product: product.into(),
            browser: BrowserType::default(),
            headless: true,
            reports_dir: PathBuf::from("reports"),
            record_video: false,
            video_dir: PathBuf::from("reports/videos"),
            user_video_folder: None,
            success_settle: Duration::from_millis(1000),
            failure_settle: Duration::from_millis(500),
        }
    }

    pub fn store_key(&self) -> String {
        format!("scenario-{}", self.scenario_id)
    }

    pub fn evidence_dir(&self) -> PathBuf {
        crate::scenario::loader::evidence_dir(&self.reports_dir, self.scenario_id)
    }
}

/// Browser-side resources held by a live session.
struct BrowserHandles {
    bridge: Arc<PlaywrightBridge>,
    browser_id: String,
    context_id: String,
    page_id: String,
}

/// One scenario run bound to a UI surface.
///
/// Production sessions are `ScenarioSession<PageHandle>` obtained from
/// [`ScenarioSession::open`]; tests bind any [`UiSurface`] via
/// [`ScenarioSession::with_surface`].
pub struct ScenarioSession<P: UiSurface + Clone> {
    surface: P,
    aggregator: ScenarioResultAggregator,
    abort: AbortSignal,
    options: SessionOptions,
    evidence_dir: PathBuf,
    run_id: String,
    session_dead: bool,
    browser: Option<BrowserHandles>,
}

impl ScenarioSession<PageHandle> {
    /// Acquire a browser context (recording when configured), open a page,
    /// and prepare the evidence directory.
    pub async fn open(
        bridge: Arc<PlaywrightBridge>,
        options: SessionOptions,
        abort: AbortSignal,
    ) -> Result<Self, HarnessError> {
        let evidence_dir = options.evidence_dir();
        std::fs::create_dir_all(&evidence_dir)
            .map_err(|e| HarnessError::Artifact(format!("evidence dir: {e}")))?;

        let browser_id = bridge.browser_launch(options.browser, options.headless).await?;

        let video = if options.record_video {
            Some(VideoSpec::standard(&options.video_dir))
        } else {
            None
        };
        let context_id = bridge
            .context_new(&browser_id, video.as_ref(), true)
            .await?;
        let page_id = bridge.page_new(&context_id).await?;
        let page = PageHandle::new(bridge.clone(), page_id.clone());

        if options.record_video {
            // Give the recorder a focused window before the first step.
            page.bridge().page_bring_to_front(page.page_id()).await?;
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            scenario = options.scenario_id,
            product = %options.product,
            recording = options.record_video,
            "session opened"
        );

        Ok(Self {
            surface: page,
            aggregator: ScenarioResultAggregator::new(),
            abort,
            options,
            evidence_dir,
            run_id,
            session_dead: false,
            browser: Some(BrowserHandles {
                bridge,
                browser_id,
                context_id,
                page_id,
            }),
        })
    }

    /// The live page, for code that needs it outside a step.
    pub fn page(&self) -> &PageHandle {
        &self.surface
    }
}

impl<P: UiSurface + Clone> ScenarioSession<P> {
    /// Bind a session to an arbitrary surface with no browser behind it.
    pub fn with_surface(surface: P, options: SessionOptions, abort: AbortSignal) -> Self {
        let evidence_dir = options.evidence_dir();
        Self {
            surface,
            aggregator: ScenarioResultAggregator::new(),
            abort,
            options,
            evidence_dir,
            run_id: uuid::Uuid::new_v4().to_string(),
            session_dead: false,
            browser: None,
        }
    }

    /// Pre-seed the aggregator with the planned step names.
    pub fn seed<I, S>(&mut self, planned: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.aggregator.seed(planned);
    }

    pub fn result(&self) -> &ScenarioResult {
        self.aggregator.result()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Execute one named step: retry loop, bookkeeping, evidence.
    ///
    /// The action receives a clone of the surface per attempt and must be
    /// idempotent under re-invocation (see [`StepRunner`]).
    pub async fn run_step<T, F, Fut>(
        &mut self,
        name: &str,
        policy: RetryPolicy,
        action: F,
    ) -> Result<T, HarnessError>
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        if self.session_dead {
            return Err(HarnessError::SessionTerminated(format!(
                "session already dead, refusing to run step '{name}'"
            )));
        }
        if self.abort.is_raised() {
            let reason = self.abort.reason().unwrap_or_else(|| "operator stop".into());
            return Err(HarnessError::ManualAbort(reason));
        }

        self.aggregator.begin_step(name);
        self.aggregator
            .append_log(name, LogLevel::Info, format!("{name} started"));

        let runner = StepRunner::new(self.abort.clone());
        let surface = self.surface.clone();
        let outcome = runner
            .run_with_retry(name, policy, || action(surface.clone()))
            .await;

        match outcome {
            Ok(value) => {
                self.aggregator
                    .append_log(name, LogLevel::Success, format!("{name} succeeded"));
                self.aggregator.end_step_success(name);
                self.finish_step_evidence(name, Outcome::Success).await?;
                Ok(value)
            }
            Err(e) => {
                self.aggregator
                    .append_log(name, LogLevel::Error, format!("{name} failed: {e}"));
                self.aggregator.end_step_failure(name, ErrorInfo::from(&e));
                if e.is_session_death() {
                    self.session_dead = true;
                }
                // Evidence errors must not mask the step's own failure.
                if let Err(evidence_err) = self.finish_step_evidence(name, Outcome::Failure).await {
                    warn!(step = name, error = %evidence_err, "failure evidence capture lost");
                }
                Err(e)
            }
        }
    }

    /// Settle, probe liveness, and capture the outcome screenshot. When the
    /// page turns out to be closed, the just-recorded outcome is corrected
    /// instead of raising a secondary capture error.
    async fn finish_step_evidence(
        &mut self,
        name: &str,
        outcome: Outcome,
    ) -> Result<(), HarnessError> {
        let settle = match outcome {
            Outcome::Success => self.options.success_settle,
            Outcome::Failure => self.options.failure_settle,
        };
        tokio::time::sleep(settle).await;

        if self.surface.is_closed().await {
            warn!(step = name, "page closed before evidence capture");
            self.session_dead = true;
            if outcome == Outcome::Success {
                self.aggregator.detect_post_hoc_failure(false);
                return Err(HarnessError::SessionTerminated(format!(
                    "session closed after '{name}' logically succeeded"
                )));
            }
            return Ok(());
        }

        let path = screenshot_path(&self.evidence_dir, name, outcome);
        match self.surface.screenshot(&path).await {
            Ok(()) => {
                let relative = path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                self.aggregator.attach_screenshot(
                    name,
                    format!("scenario-{}/{relative}", self.options.scenario_id),
                    format!("{name} {} screenshot", outcome.as_str()),
                );
                info!(step = name, path = %path.display(), "screenshot captured");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if implies_session_death(&message) {
                    self.session_dead = true;
                    if outcome == Outcome::Success {
                        self.aggregator.detect_post_hoc_failure(false);
                        return Err(HarnessError::SessionTerminated(format!(
                            "session died capturing evidence for '{name}': {message}"
                        )));
                    }
                } else {
                    // Capture problems on a live page are logged, not fatal.
                    warn!(step = name, error = %message, "screenshot capture failed");
                }
                Ok(())
            }
        }
    }

    /// Tear down the session: close the context, finalize any recording,
    /// sweep the aggregator, and persist the result.
    ///
    /// Runs on both the pass and fail paths; structure scenario execution so
    /// this is always reached.
    pub async fn close(mut self, store: &ResultsStore) -> Result<ScenarioResult, HarnessError> {
        let video_path = self.finalize_browser().await;

        if let Some(video_path) = video_path {
            self.finalize_video(&video_path);
        }

        let abort_reason = if self.abort.is_raised() {
            Some(self.abort.reason().unwrap_or_else(|| "operator stop".into()))
        } else {
            None
        };

        self.aggregator.finalize(abort_reason.as_deref());
        let result = self.aggregator.into_result();

        let key = self.options.store_key();
        if let Err(e) = store.persist(&key, &result) {
            // The run still has a verdict; losing the durable copy is an
            // artifact failure.
            warn!(key = %key, error = %e, "failed to persist scenario result");
            return Err(HarnessError::Artifact(format!("persist {key}: {e}")));
        }

        info!(run_id = %self.run_id, key = %key, passed = result.passed(), "session closed");
        Ok(result)
    }

    /// Close context and browser, returning the recorded video path if any.
    async fn finalize_browser(&mut self) -> Option<PathBuf> {
        let handles = self.browser.as_ref()?;

        // Ask for the video path before the page object disappears; the
        // file itself is only complete once the context closes.
        let video_path = if self.options.record_video {
            match handles.bridge.page_video_path(&handles.page_id).await {
                Ok(path) => path.map(PathBuf::from),
                Err(e) => {
                    warn!(error = %e, "could not resolve video path");
                    None
                }
            }
        } else {
            None
        };

        if let Err(e) = handles.bridge.context_close(&handles.context_id).await {
            warn!(error = %e, "context close failed");
        }
        if let Err(e) = handles.bridge.browser_close(&handles.browser_id).await {
            warn!(error = %e, "browser close failed");
        }

        video_path
    }

    /// Rename the raw recording to the deterministic
    /// `{product}-scenario-{id}-{local-timestamp}.webm` scheme and copy it
    /// to the user folder when configured. All best effort.
    fn finalize_video(&self, raw_path: &Path) {
        if !raw_path.exists() {
            warn!(path = %raw_path.display(), "recorded video not found");
            return;
        }

        let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
        let ext = raw_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("webm");
        let new_name = format!(
            "{}-scenario-{}-{}.{ext}",
            self.options.product, self.options.scenario_id, timestamp
        );
        let new_path = raw_path.with_file_name(&new_name);

        if let Err(e) = std::fs::rename(raw_path, &new_path) {
            warn!(error = %e, "video rename failed");
            return;
        }
        info!(path = %new_path.display(), "recording finalized");

        if let Some(user_folder) = &self.options.user_video_folder {
            if user_folder.is_dir() {
                let dest = user_folder.join(&new_name);
                match std::fs::copy(&new_path, &dest) {
                    Ok(_) => info!(path = %dest.display(), "recording copied to user folder"),
                    Err(e) => warn!(error = %e, "copy to user folder failed"),
                }
            } else {
                warn!(path = %user_folder.display(), "configured user recording folder does not exist");
            }
        }
    }
}
