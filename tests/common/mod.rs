#![allow(dead_code)]

//! Shared fixtures for integration tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scenario_harness::harness::{HarnessError, UiSurface};
use tempfile::TempDir;

/// A controllable [`UiSurface`] so session and step-runner evidence paths
/// run without a browser.
#[derive(Clone, Default)]
pub struct MockSurface {
    inner: Arc<MockSurfaceInner>,
}

#[derive(Default)]
struct MockSurfaceInner {
    closed: AtomicBool,
    fail_screenshot: Mutex<Option<String>>,
    screenshots: Mutex<Vec<PathBuf>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the browser being torn down out-of-band.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Make the next screenshot calls fail with the given message.
    pub fn fail_screenshots_with(&self, message: &str) {
        *self.inner.fail_screenshot.lock().unwrap() = Some(message.to_string());
    }

    /// Paths of all screenshots captured so far.
    pub fn captured(&self) -> Vec<PathBuf> {
        self.inner.screenshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl UiSurface for MockSurface {
    async fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    async fn screenshot(&self, path: &Path) -> Result<(), HarnessError> {
        if let Some(message) = self.inner.fail_screenshot.lock().unwrap().clone() {
            return Err(HarnessError::Artifact(message));
        }
        self.inner.screenshots.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Create a scratch directory for a test run.
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

/// A minimal valid scenario YAML with the given id.
pub fn simple_scenario(id: u32) -> String {
    format!(
        r#"
id: {id}
name: smoke {id}
product: viola
steps:
  - name: open console
    uses: page/goto
    with:
      url: https://console.local
  - name: confirm title
    uses: assert/title_is
    with:
      title: Console
"#
    )
}

/// Write a scenario file into `dir`.
pub fn write_scenario(dir: &Path, file_name: &str, content: &str) {
    std::fs::write(dir.join(file_name), content).expect("failed to write scenario file");
}
