//! Bridge to the Playwright sidecar process
//!
//! All browser interaction goes through a single long-lived Node.js sidecar
//! speaking JSON-RPC over stdin/stdout. The bridge exposes typed methods for
//! the browser/context/page lifecycle plus the element, wait, and screenshot
//! calls the harness needs.

use async_trait::async_trait;
use serde_json::Value;

pub mod playwright;
pub mod rpc;

pub use playwright::{PageHandle, PlaywrightBridge, VideoSpec};

/// Common error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to start sidecar: {0}")]
    StartupFailed(String),

    #[error("Sidecar disconnected")]
    Disconnected,

    #[error("Sidecar error: {0}")]
    ServerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Low-level escape hatch: invoke any sidecar method with raw JSON params.
///
/// The typed methods on [`PlaywrightBridge`] cover the harness; this trait
/// exists so tests and one-off tools can reach methods without a wrapper.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn call(&self, method: &str, args: Value) -> Result<Value, BridgeError>;
}
