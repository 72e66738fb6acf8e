//! Durable results store
//!
//! Results are keyed by `scenario-<id>`. Each writer owns exactly one
//! per-scenario file (`<key>.json`, written atomically via temp file +
//! rename), so concurrent scenario processes never touch the same file. The
//! combined `all-results.json` document is derived by re-merging the
//! per-scenario files after every persist; it is a convenience view, not the
//! source of truth.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::harness::aggregator::ScenarioResult;

/// Name of the derived combined document.
pub const COMBINED_FILE: &str = "all-results.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {file}: {error}")]
    Io {
        file: String,
        error: std::io::Error,
    },

    #[error("JSON error in {file}: {error}")]
    Json {
        file: String,
        error: serde_json::Error,
    },
}

fn io_err(path: &Path, error: std::io::Error) -> StoreError {
    StoreError::Io {
        file: path.display().to_string(),
        error,
    }
}

fn json_err(path: &Path, error: serde_json::Error) -> StoreError {
    StoreError::Json {
        file: path.display().to_string(),
        error,
    }
}

/// JSON-backed store of scenario results under one directory.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    dir: PathBuf,
}

impl ResultsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Persist one scenario's result. Other scenarios' entries are never
    /// touched, so persisting `scenario-8` cannot erase `scenario-7`.
    pub fn persist(&self, key: &str, result: &ScenarioResult) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;

        let path = self.entry_path(key);
        let json =
            serde_json::to_string_pretty(result).map_err(|e| json_err(&path, e))?;
        write_atomic(&path, &json)?;

        // Refresh the combined view; failures here never fail the persist,
        // the per-scenario file already landed.
        if let Err(e) = self.write_combined() {
            warn!(error = %e, "failed to refresh combined results document");
        }

        Ok(())
    }

    /// Load one scenario's result, if present.
    pub fn load(&self, key: &str) -> Result<Option<ScenarioResult>, StoreError> {
        let path = self.entry_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let result = serde_json::from_str(&content).map_err(|e| json_err(&path, e))?;
        Ok(Some(result))
    }

    /// Merge every per-scenario file into one map keyed `scenario-<id>`.
    pub fn merged(&self) -> Result<BTreeMap<String, ScenarioResult>, StoreError> {
        let mut merged = BTreeMap::new();

        if !self.dir.is_dir() {
            return Ok(merged);
        }

        for entry in std::fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))? {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json")
                || !stem.starts_with("scenario-")
            {
                continue;
            }

            let content = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            match serde_json::from_str::<ScenarioResult>(&content) {
                Ok(result) => {
                    merged.insert(stem.to_string(), result);
                }
                Err(e) => {
                    // A half-written or foreign file should not take the
                    // whole store down.
                    warn!(file = %path.display(), error = %e, "skipping unreadable result entry");
                }
            }
        }

        Ok(merged)
    }

    fn write_combined(&self) -> Result<(), StoreError> {
        let merged = self.merged()?;
        let path = self.dir.join(COMBINED_FILE);
        let json = serde_json::to_string_pretty(&merged).map_err(|e| json_err(&path, e))?;
        write_atomic(&path, &json)
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))
}
