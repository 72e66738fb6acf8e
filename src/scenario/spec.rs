//! Scenario and step definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::harness::retry::RetryPolicy;

/// Browser engine to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserType::Chromium => "chromium",
            BrowserType::Firefox => "firefox",
            BrowserType::Webkit => "webkit",
        }
    }
}

/// A complete scenario definition, loaded from `scenario-<id>.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Scenario id; also keys the results store entry (`scenario-<id>`).
    pub id: u32,

    /// Human-readable scenario name
    pub name: String,

    /// Product console this scenario drives (used in artifact names)
    pub product: String,

    /// Browser to launch
    #[serde(default)]
    pub browser: BrowserType,

    /// Run headless
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Ordered steps to execute
    pub steps: Vec<StepSpec>,
}

fn default_headless() -> bool {
    true
}

impl ScenarioSpec {
    /// The results-store key for this scenario.
    pub fn store_key(&self) -> String {
        format!("scenario-{}", self.id)
    }

    /// Step names in declared order, for pre-seeding the aggregator.
    pub fn planned_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name; unique within the scenario, used in logs and evidence
    /// file names
    pub name: String,

    /// Action to use (e.g., "page/goto", "element/click")
    pub uses: String,

    /// Action parameters; `${key}` placeholders resolve from the scenario
    /// settings
    #[serde(default)]
    pub with: HashMap<String, serde_yaml::Value>,

    /// Retry configuration; defaults to the harness-wide policy
    pub retry: Option<RetrySpec>,
}

/// Retry configuration for a step. Backoff is a fixed delay, so a polling
/// step is bounded by `max_attempts * backoff_ms` total, not a wall-clock
/// deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySpec {
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_backoff_ms() -> u64 {
    2000
}

impl RetrySpec {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_deserialize() {
        let yaml = r##"
id: 7
name: login smoke
product: contrabass
steps:
  - name: open console
    uses: page/goto
    with:
      url: "https://console.local/login"
  - name: sign in
    uses: element/fill
    with:
      selector: "#userId"
      value: "${login.userId}"
    retry:
      max_attempts: 3
      backoff_ms: 1500
"##;

        let spec: ScenarioSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.id, 7);
        assert_eq!(spec.store_key(), "scenario-7");
        assert_eq!(spec.product, "contrabass");
        assert!(spec.headless);
        assert_eq!(spec.browser, BrowserType::Chromium);
        assert_eq!(spec.planned_names(), vec!["open console", "sign in"]);

        let retry = spec.steps[1].retry.as_ref().unwrap();
        assert_eq!(retry.policy(), RetryPolicy::new(3, Duration::from_millis(1500)));
    }

    #[test]
    fn test_retry_backoff_defaults() {
        let yaml = "max_attempts: 5";
        let retry: RetrySpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(retry.backoff_ms, 2000);
    }

    #[test]
    fn test_browser_type_roundtrip() {
        assert_eq!(BrowserType::Firefox.as_str(), "firefox");
        let parsed: BrowserType = serde_yaml::from_str("webkit").unwrap();
        assert_eq!(parsed, BrowserType::Webkit);
    }
}
