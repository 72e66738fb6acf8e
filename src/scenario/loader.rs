//! Scenario file loader
//!
//! Scenarios live as `scenario-<id>.yaml` files in a directory.

use std::path::{Path, PathBuf};

use super::spec::ScenarioSpec;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("No scenario file for id {id} under {dir}")]
    NotFound { id: u32, dir: String },
}

pub struct ScenarioLoader;

impl ScenarioLoader {
    /// Locate and load the scenario with the given id.
    pub fn load_by_id(dir: &Path, id: u32) -> Result<ScenarioSpec, LoadError> {
        for name in [format!("scenario-{id}.yaml"), format!("scenario-{id}.yml")] {
            let path = dir.join(&name);
            if path.is_file() {
                return Self::load_file(&path);
            }
        }
        Err(LoadError::NotFound {
            id,
            dir: dir.display().to_string(),
        })
    }

    pub fn load_file(path: &Path) -> Result<ScenarioSpec, LoadError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
            file: path.display().to_string(),
            error: e,
        })
    }

    /// Load every scenario file in a directory, sorted by id.
    pub fn load_directory(dir: &Path) -> Result<Vec<ScenarioSpec>, LoadError> {
        let mut scenarios = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() {
                let ext = path.extension().and_then(|e| e.to_str());
                let stem = path.file_stem().and_then(|n| n.to_str()).unwrap_or("");

                if (ext == Some("yaml") || ext == Some("yml")) && stem.starts_with("scenario-") {
                    scenarios.push(Self::load_file(&path)?);
                }
            }
        }

        scenarios.sort_by_key(|s| s.id);
        Ok(scenarios)
    }
}

/// Where a scenario run keeps its evidence:
/// `<reports_dir>/scenario-<id>/`.
pub fn evidence_dir(reports_dir: &Path, scenario_id: u32) -> PathBuf {
    reports_dir.join(format!("scenario-{scenario_id}"))
}
