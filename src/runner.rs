//! Declarative scenario interpreter
//!
//! Executes a [`ScenarioSpec`]'s ordered step descriptors through a
//! [`ScenarioSession`]: one linear loop, one step at a time, stopping at the
//! first failure and leaving the rest for the finalization sweep to mark as
//! not run.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::bridge::PlaywrightBridge;
use crate::harness::{
    AbortSignal, HarnessError, RetryPolicy, ScenarioResult, ScenarioSession, SessionOptions,
};
use crate::report::ResultsStore;
use crate::scenario::{action, ParsedAction, ScenarioSettings, ScenarioSpec, StepSpec};

/// What a scenario run produced: the finalized result plus the error that
/// stopped the step loop, if any. The result is persisted either way.
#[derive(Debug)]
pub struct RunOutcome {
    pub result: ScenarioResult,
    pub error: Option<HarnessError>,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.result.passed() && self.error.is_none()
    }
}

/// Resolve a step's `with` parameters into strings, substituting `${key}`
/// placeholders from the settings.
fn evaluate_params(
    step: &StepSpec,
    settings: &ScenarioSettings,
) -> Result<HashMap<String, String>, HarnessError> {
    let mut params = HashMap::new();
    for (key, value) in &step.with {
        let text = match value {
            serde_yaml::Value::String(s) => settings
                .resolve(s)
                .map_err(|e| HarnessError::ConfigError(e.to_string()))?,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            other => {
                return Err(HarnessError::ConfigError(format!(
                    "step '{}': parameter '{key}' has unsupported type: {other:?}",
                    step.name
                )))
            }
        };
        params.insert(key.clone(), text);
    }
    Ok(params)
}

/// Parse every step's action up front so a malformed scenario fails before
/// a browser is launched.
pub fn validate(spec: &ScenarioSpec) -> Result<(), HarnessError> {
    for step in &spec.steps {
        ParsedAction::parse(&step.uses)?;
    }
    Ok(())
}

/// Run one scenario end to end and persist its result.
///
/// Step failures do not bubble as `Err`; they come back inside
/// [`RunOutcome`] with the finalized result. `Err` means the run could not
/// be carried out at all (browser startup, result persistence).
#[instrument(skip_all, fields(scenario = spec.id, product = %spec.product))]
pub async fn run_scenario(
    bridge: Arc<PlaywrightBridge>,
    spec: &ScenarioSpec,
    settings: &ScenarioSettings,
    options: SessionOptions,
    abort: AbortSignal,
    store: &ResultsStore,
) -> Result<RunOutcome, HarnessError> {
    validate(spec)?;

    let mut session = ScenarioSession::open(bridge, options, abort).await?;
    session.seed(spec.planned_names());

    let mut first_error = None;

    for step in &spec.steps {
        let policy = step
            .retry
            .as_ref()
            .map(|r| r.policy())
            .unwrap_or_default();

        let parsed = match ParsedAction::parse(&step.uses) {
            Ok(parsed) => parsed,
            Err(e) => {
                first_error = Some(e);
                break;
            }
        };

        info!(step = %step.name, uses = %step.uses, "running step");

        let settings = settings.clone();
        let step_spec = step.clone();
        let outcome = session
            .run_step(&step.name, policy, move |page| {
                let parsed = parsed.clone();
                let settings = settings.clone();
                let step_spec = step_spec.clone();
                async move {
                    let params = evaluate_params(&step_spec, &settings)?;
                    action::execute(&page, &parsed, &params).await
                }
            })
            .await;

        match outcome {
            Ok(outputs) => {
                if !outputs.is_empty() {
                    info!(step = %step.name, ?outputs, "step outputs");
                }
            }
            Err(e) => {
                error!(step = %step.name, error = %e, "step failed, stopping scenario");
                first_error = Some(e);
                break;
            }
        }
    }

    // Close always runs, pass or fail, so evidence and the durable result
    // survive a failed run.
    let result = session.close(store).await?;

    Ok(RunOutcome {
        result,
        error: first_error,
    })
}
