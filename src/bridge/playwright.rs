//! Playwright sidecar bridge
//!
//! Spawns the Node.js Playwright server and exposes typed wrappers over its
//! JSON-RPC methods. The harness drives one browser, one context (optionally
//! recording video), and one page per scenario; [`PageHandle`] bundles the
//! bridge with a page id so domain steps and the evidence layer can share a
//! single cheap handle.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::rpc::{send_request, spawn_communication_task, RequestSender};
use super::BridgeError;
use crate::harness::error::HarnessError;
use crate::harness::evidence::UiSurface;
use crate::scenario::BrowserType;

/// Video recording parameters for a context.
#[derive(Debug, Clone)]
pub struct VideoSpec {
    pub dir: std::path::PathBuf,
    pub width: u32,
    pub height: u32,
}

impl VideoSpec {
    /// 1280x720, the size console runs are recorded at.
    pub fn standard(dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            width: 1280,
            height: 720,
        }
    }
}

pub struct PlaywrightBridge {
    request_tx: RequestSender,
    #[allow(dead_code)]
    child: Child,
}

impl PlaywrightBridge {
    /// Spawn the sidecar. The `node` binary is resolved up front so a
    /// missing runtime reads as a startup error, not a spawn failure.
    pub async fn start() -> Result<Self, BridgeError> {
        let node = which::which("node")
            .map_err(|e| BridgeError::StartupFailed(format!("node binary not found: {e}")))?;

        let mut child = Command::new(node)
            .arg("sidecar/playwright/server.js")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| BridgeError::StartupFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::StartupFailed("sidecar stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::StartupFailed("sidecar stdout unavailable".into()))?;

        let (request_tx, request_rx) = mpsc::channel(100);
        spawn_communication_task(request_rx, stdin, stdout);

        Ok(Self { request_tx, child })
    }

    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        send_request(&self.request_tx, method, params).await
    }

    fn required_str(result: &serde_json::Value, key: &str) -> Result<String, BridgeError> {
        result[key]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| BridgeError::ServerError(format!("No {key} returned")))
    }

    // Browser lifecycle

    pub async fn browser_launch(
        &self,
        browser_type: BrowserType,
        headless: bool,
    ) -> Result<String, BridgeError> {
        let result = self
            .request(
                "browser.launch",
                serde_json::json!({
                    "browserType": browser_type.as_str(),
                    "headless": headless,
                }),
            )
            .await?;
        Self::required_str(&result, "browserId")
    }

    pub async fn browser_close(&self, browser_id: &str) -> Result<(), BridgeError> {
        self.request(
            "browser.close",
            serde_json::json!({ "browserId": browser_id }),
        )
        .await?;
        Ok(())
    }

    // Context lifecycle

    pub async fn context_new(
        &self,
        browser_id: &str,
        video: Option<&VideoSpec>,
        ignore_https_errors: bool,
    ) -> Result<String, BridgeError> {
        let mut params = serde_json::json!({
            "browserId": browser_id,
            "ignoreHTTPSErrors": ignore_https_errors,
        });
        if let Some(video) = video {
            params["recordVideo"] = serde_json::json!({
                "dir": video.dir.display().to_string(),
                "size": { "width": video.width, "height": video.height },
            });
        }
        let result = self.request("context.new", params).await?;
        Self::required_str(&result, "contextId")
    }

    pub async fn context_close(&self, context_id: &str) -> Result<(), BridgeError> {
        self.request(
            "context.close",
            serde_json::json!({ "contextId": context_id }),
        )
        .await?;
        Ok(())
    }

    // Page lifecycle

    pub async fn page_new(&self, context_id: &str) -> Result<String, BridgeError> {
        let result = self
            .request("page.new", serde_json::json!({ "contextId": context_id }))
            .await?;
        Self::required_str(&result, "pageId")
    }

    pub async fn page_bring_to_front(&self, page_id: &str) -> Result<(), BridgeError> {
        self.request(
            "page.bringToFront",
            serde_json::json!({ "pageId": page_id }),
        )
        .await?;
        Ok(())
    }

    pub async fn page_is_closed(&self, page_id: &str) -> Result<bool, BridgeError> {
        let result = self
            .request("page.isClosed", serde_json::json!({ "pageId": page_id }))
            .await?;
        Ok(result["closed"].as_bool().unwrap_or(true))
    }

    /// Path of the video recorded for this page, if the context records one.
    pub async fn page_video_path(&self, page_id: &str) -> Result<Option<String>, BridgeError> {
        let result = self
            .request("page.videoPath", serde_json::json!({ "pageId": page_id }))
            .await?;
        Ok(result["path"].as_str().map(|s| s.to_string()))
    }

    pub async fn page_goto(&self, page_id: &str, url: &str) -> Result<(), BridgeError> {
        self.request(
            "page.goto",
            serde_json::json!({ "pageId": page_id, "url": url }),
        )
        .await?;
        Ok(())
    }

    pub async fn page_reload(&self, page_id: &str) -> Result<(), BridgeError> {
        self.request("page.reload", serde_json::json!({ "pageId": page_id }))
            .await?;
        Ok(())
    }

    pub async fn page_url(&self, page_id: &str) -> Result<String, BridgeError> {
        let result = self
            .request("page.url", serde_json::json!({ "pageId": page_id }))
            .await?;
        Self::required_str(&result, "url")
    }

    pub async fn page_title(&self, page_id: &str) -> Result<String, BridgeError> {
        let result = self
            .request("page.title", serde_json::json!({ "pageId": page_id }))
            .await?;
        Self::required_str(&result, "title")
    }

    // Element actions

    pub async fn element_click(&self, page_id: &str, selector: &str) -> Result<(), BridgeError> {
        self.request(
            "element.click",
            serde_json::json!({ "pageId": page_id, "selector": selector }),
        )
        .await?;
        Ok(())
    }

    pub async fn element_fill(
        &self,
        page_id: &str,
        selector: &str,
        value: &str,
    ) -> Result<(), BridgeError> {
        self.request(
            "element.fill",
            serde_json::json!({ "pageId": page_id, "selector": selector, "value": value }),
        )
        .await?;
        Ok(())
    }

    pub async fn element_type(
        &self,
        page_id: &str,
        selector: &str,
        text: &str,
        delay: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.request(
            "element.type",
            serde_json::json!({ "pageId": page_id, "selector": selector, "text": text, "delay": delay }),
        )
        .await?;
        Ok(())
    }

    pub async fn element_select(
        &self,
        page_id: &str,
        selector: &str,
        value: &str,
    ) -> Result<(), BridgeError> {
        self.request(
            "element.select",
            serde_json::json!({ "pageId": page_id, "selector": selector, "value": value }),
        )
        .await?;
        Ok(())
    }

    pub async fn element_hover(&self, page_id: &str, selector: &str) -> Result<(), BridgeError> {
        self.request(
            "element.hover",
            serde_json::json!({ "pageId": page_id, "selector": selector }),
        )
        .await?;
        Ok(())
    }

    pub async fn element_text(&self, page_id: &str, selector: &str) -> Result<String, BridgeError> {
        let result = self
            .request(
                "element.textContent",
                serde_json::json!({ "pageId": page_id, "selector": selector }),
            )
            .await?;
        Self::required_str(&result, "text")
    }

    pub async fn element_is_visible(
        &self,
        page_id: &str,
        selector: &str,
    ) -> Result<bool, BridgeError> {
        let result = self
            .request(
                "element.isVisible",
                serde_json::json!({ "pageId": page_id, "selector": selector }),
            )
            .await?;
        Ok(result["visible"].as_bool().unwrap_or(false))
    }

    // Waits

    pub async fn wait_for_selector(
        &self,
        page_id: &str,
        selector: &str,
        timeout: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.request(
            "wait.selector",
            serde_json::json!({ "pageId": page_id, "selector": selector, "timeout": timeout }),
        )
        .await?;
        Ok(())
    }

    /// Wait for the element to detach from the DOM.
    pub async fn wait_for_detached(
        &self,
        page_id: &str,
        selector: &str,
        timeout: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.request(
            "wait.detached",
            serde_json::json!({ "pageId": page_id, "selector": selector, "timeout": timeout }),
        )
        .await?;
        Ok(())
    }

    pub async fn wait_for_navigation(
        &self,
        page_id: &str,
        timeout: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.request(
            "wait.navigation",
            serde_json::json!({ "pageId": page_id, "timeout": timeout }),
        )
        .await?;
        Ok(())
    }

    pub async fn wait_for_url(
        &self,
        page_id: &str,
        pattern: &str,
        timeout: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.request(
            "wait.url",
            serde_json::json!({ "pageId": page_id, "pattern": pattern, "timeout": timeout }),
        )
        .await?;
        Ok(())
    }

    // Evidence

    pub async fn screenshot(
        &self,
        page_id: &str,
        path: &str,
        full_page: bool,
    ) -> Result<(), BridgeError> {
        self.request(
            "page.screenshot",
            serde_json::json!({ "pageId": page_id, "path": path, "fullPage": full_page }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl super::Bridge for PlaywrightBridge {
    async fn call(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        self.request(method, args).await
    }
}

/// One page of one scenario session: the bridge plus the page id.
///
/// Clones are cheap; domain step closures receive one per attempt.
#[derive(Clone)]
pub struct PageHandle {
    bridge: Arc<PlaywrightBridge>,
    page_id: String,
}

impl PageHandle {
    pub fn new(bridge: Arc<PlaywrightBridge>, page_id: String) -> Self {
        Self { bridge, page_id }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn bridge(&self) -> &PlaywrightBridge {
        &self.bridge
    }

    pub async fn goto(&self, url: &str) -> Result<(), BridgeError> {
        self.bridge.page_goto(&self.page_id, url).await
    }

    pub async fn reload(&self) -> Result<(), BridgeError> {
        self.bridge.page_reload(&self.page_id).await
    }

    pub async fn url(&self) -> Result<String, BridgeError> {
        self.bridge.page_url(&self.page_id).await
    }

    pub async fn title(&self) -> Result<String, BridgeError> {
        self.bridge.page_title(&self.page_id).await
    }

    pub async fn click(&self, selector: &str) -> Result<(), BridgeError> {
        self.bridge.element_click(&self.page_id, selector).await
    }

    pub async fn fill(&self, selector: &str, value: &str) -> Result<(), BridgeError> {
        self.bridge.element_fill(&self.page_id, selector, value).await
    }

    pub async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.bridge
            .element_type(&self.page_id, selector, text, delay)
            .await
    }

    pub async fn select(&self, selector: &str, value: &str) -> Result<(), BridgeError> {
        self.bridge
            .element_select(&self.page_id, selector, value)
            .await
    }

    pub async fn hover(&self, selector: &str) -> Result<(), BridgeError> {
        self.bridge.element_hover(&self.page_id, selector).await
    }

    pub async fn text(&self, selector: &str) -> Result<String, BridgeError> {
        self.bridge.element_text(&self.page_id, selector).await
    }

    pub async fn is_visible(&self, selector: &str) -> Result<bool, BridgeError> {
        self.bridge
            .element_is_visible(&self.page_id, selector)
            .await
    }

    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.bridge
            .wait_for_selector(&self.page_id, selector, timeout)
            .await
    }

    pub async fn wait_for_detached(
        &self,
        selector: &str,
        timeout: Option<u64>,
    ) -> Result<(), BridgeError> {
        self.bridge
            .wait_for_detached(&self.page_id, selector, timeout)
            .await
    }

    pub async fn wait_for_navigation(&self, timeout: Option<u64>) -> Result<(), BridgeError> {
        self.bridge.wait_for_navigation(&self.page_id, timeout).await
    }

    pub async fn wait_for_url(&self, pattern: &str, timeout: Option<u64>) -> Result<(), BridgeError> {
        self.bridge
            .wait_for_url(&self.page_id, pattern, timeout)
            .await
    }

    pub async fn video_path(&self) -> Result<Option<String>, BridgeError> {
        self.bridge.page_video_path(&self.page_id).await
    }
}

#[async_trait]
impl UiSurface for PageHandle {
    async fn is_closed(&self) -> bool {
        // A bridge that cannot answer is treated as a dead session.
        self.bridge
            .page_is_closed(&self.page_id)
            .await
            .unwrap_or(true)
    }

    async fn screenshot(&self, path: &Path) -> Result<(), HarnessError> {
        self.bridge
            .screenshot(&self.page_id, &path.display().to_string(), true)
            .await
            .map_err(|e| HarnessError::Artifact(e.to_string()))
    }
}
