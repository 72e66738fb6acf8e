//! Scenario definitions
//!
//! A scenario is one linear, ordered sequence of named browser steps for one
//! product console, declared in YAML. Settings (credentials, project names,
//! recording flags) live in a separate per-scenario settings store so the
//! same scenario file can run against different environments.

pub mod action;
pub mod loader;
pub mod settings;
pub mod spec;

pub use action::{ActionCategory, ParsedAction};
pub use loader::{LoadError, ScenarioLoader};
pub use settings::{RecordingSettings, ScenarioSettings, SettingsError};
pub use spec::{BrowserType, RetrySpec, ScenarioSpec, StepSpec};
