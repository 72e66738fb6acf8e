//! Per-scenario settings
//!
//! Flat key/value settings loaded from JSON files in the config directory:
//!
//! - `test-settings-<id>.json`, falling back to `test-settings.json` when no
//!   scenario-specific override exists (recognized keys include
//!   `login.userId`, `login.password`, `project.code`, `project.name`,
//!   `repository.name`, `repository.group`)
//! - `recording-settings.json`: scenario id -> recording enabled
//! - `user-recording-folders.json`: scenario id -> destination folder for a
//!   copy of the recorded video
//!
//! Nested JSON objects flatten into dotted keys, so `{"login": {"userId":
//! "x"}}` is addressed as `login.userId`.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error reading {file}: {error}")]
    Io {
        file: String,
        error: std::io::Error,
    },

    #[error("JSON parse error in {file}: {error}")]
    Json {
        file: String,
        error: serde_json::Error,
    },

    #[error("No settings file found for scenario {0} and no default settings exist")]
    Missing(u32),

    #[error("Unknown settings key '${{{0}}}'")]
    UnknownKey(String),
}

fn read_json(path: &Path) -> Result<Value, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|error| SettingsError::Io {
        file: path.display().to_string(),
        error,
    })?;
    serde_json::from_str(&content).map_err(|error| SettingsError::Json {
        file: path.display().to_string(),
        error,
    })
}

fn flatten(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&key, child, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Null | Value::Array(_) => {}
    }
}

/// Flat settings for one scenario run.
#[derive(Debug, Clone, Default)]
pub struct ScenarioSettings {
    values: HashMap<String, String>,
}

impl ScenarioSettings {
    /// Load `test-settings-<id>.json`, falling back to `test-settings.json`.
    pub fn load(config_dir: &Path, scenario_id: u32) -> Result<Self, SettingsError> {
        let specific = config_dir.join(format!("test-settings-{scenario_id}.json"));
        let fallback = config_dir.join("test-settings.json");

        let path = if specific.exists() {
            specific
        } else if fallback.exists() {
            fallback
        } else {
            return Err(SettingsError::Missing(scenario_id));
        };

        let mut values = HashMap::new();
        flatten("", &read_json(&path)?, &mut values);
        Ok(Self { values })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Substitute every `${key}` placeholder in `template` from the settings.
    /// Unknown keys are an error so a typo fails the step up front instead of
    /// typing a literal `${login.userId}` into a form.
    pub fn resolve(&self, template: &str) -> Result<String, SettingsError> {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            let Some(end) = rest[start..].find('}') else {
                break;
            };
            result.push_str(&rest[..start]);
            let key = &rest[start + 2..start + end];
            match self.values.get(key) {
                Some(value) => result.push_str(value),
                None => return Err(SettingsError::UnknownKey(key.to_string())),
            }
            rest = &rest[start + end + 1..];
        }
        result.push_str(rest);
        Ok(result)
    }
}

/// Recording flags and destination folders, keyed by scenario id.
#[derive(Debug, Clone, Default)]
pub struct RecordingSettings {
    enabled: HashMap<String, bool>,
    user_folders: HashMap<String, PathBuf>,
}

impl RecordingSettings {
    /// Both files are optional; a missing file just means recording stays
    /// off and no copy destination is configured.
    pub fn load(config_dir: &Path) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        let flags_path = config_dir.join("recording-settings.json");
        if flags_path.exists() {
            if let Value::Object(map) = read_json(&flags_path)? {
                for (key, value) in map {
                    settings.enabled.insert(key, value.as_bool().unwrap_or(false));
                }
            }
        }

        let folders_path = config_dir.join("user-recording-folders.json");
        if folders_path.exists() {
            if let Value::Object(map) = read_json(&folders_path)? {
                for (key, value) in map {
                    if let Some(path) = value.as_str() {
                        settings.user_folders.insert(key, PathBuf::from(path));
                    }
                }
            }
        }

        Ok(settings)
    }

    pub fn is_enabled(&self, scenario_id: u32) -> bool {
        self.enabled
            .get(&scenario_id.to_string())
            .copied()
            .unwrap_or(false)
    }

    pub fn user_folder(&self, scenario_id: u32) -> Option<&Path> {
        self.user_folders
            .get(&scenario_id.to_string())
            .map(|p| p.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_specific_settings_shadow_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("test-settings.json"),
            r#"{"login": {"userId": "default-user"}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("test-settings-3.json"),
            r#"{"login": {"userId": "scenario-three-user", "password": "pw"}}"#,
        )
        .unwrap();

        let settings = ScenarioSettings::load(dir.path(), 3).unwrap();
        assert_eq!(settings.get("login.userId"), Some("scenario-three-user"));
        assert_eq!(settings.get("login.password"), Some("pw"));

        let fallback = ScenarioSettings::load(dir.path(), 9).unwrap();
        assert_eq!(fallback.get("login.userId"), Some("default-user"));
    }

    #[test]
    fn test_missing_settings_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ScenarioSettings::load(dir.path(), 1),
            Err(SettingsError::Missing(1))
        ));
    }

    #[test]
    fn test_nested_keys_flatten_with_dots() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("test-settings.json"),
            r#"{"project": {"code": "PRJ-1", "name": "Demo"}, "timeoutMs": 5000}"#,
        )
        .unwrap();

        let settings = ScenarioSettings::load(dir.path(), 1).unwrap();
        assert_eq!(settings.get("project.code"), Some("PRJ-1"));
        assert_eq!(settings.get("timeoutMs"), Some("5000"));
    }

    #[test]
    fn test_placeholder_resolution() {
        let settings =
            ScenarioSettings::from_pairs([("login.userId", "alice"), ("project.code", "PRJ")]);

        assert_eq!(
            settings.resolve("user ${login.userId} on ${project.code}").unwrap(),
            "user alice on PRJ"
        );
        assert_eq!(settings.resolve("no placeholders").unwrap(), "no placeholders");
        assert!(matches!(
            settings.resolve("${missing.key}"),
            Err(SettingsError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_recording_settings() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("recording-settings.json"),
            r#"{"1": true, "2": false}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("user-recording-folders.json"),
            r#"{"1": "/tmp/recordings"}"#,
        )
        .unwrap();

        let settings = RecordingSettings::load(dir.path()).unwrap();
        assert!(settings.is_enabled(1));
        assert!(!settings.is_enabled(2));
        assert!(!settings.is_enabled(99));
        assert_eq!(
            settings.user_folder(1),
            Some(Path::new("/tmp/recordings"))
        );
        assert_eq!(settings.user_folder(2), None);
    }

    #[test]
    fn test_recording_settings_missing_files_default_off() {
        let dir = tempdir().unwrap();
        let settings = RecordingSettings::load(dir.path()).unwrap();
        assert!(!settings.is_enabled(1));
    }
}
