//! Browser automation capability
//!
//! The pipeline only talks to these traits. [`chromium`] provides the
//! production implementation on top of `chromiumoxide`; tests drive the
//! same code through in-memory doubles.

pub mod chromium;
pub mod strategy;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chromium::ChromiumLauncher;
pub use strategy::SelectorStrategy;

/// Function declaration run against an element (bound as `this`)
pub const SYNTHETIC_CLICK: &str = "function() { this.click(); }";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("Timed out after {timeout_secs}s during {operation}")]
    Timeout { operation: String, timeout_secs: u64 },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("No element matches selector '{selector}'")]
    ElementNotFound { selector: String },

    #[error("Element interaction failed: {0}")]
    Interaction(String),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Browser session closed: {0}")]
    SessionClosed(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),
}

impl BrowserError {
    pub fn timeout(operation: &str, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
            timeout_secs: timeout.as_secs(),
        }
    }

    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The surface itself is gone; nothing on it can be retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionClosed(_) | Self::Launch(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Load-state signal a navigation waits for, strictest last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

#[async_trait]
pub trait SurfaceElement: Send + Sync {
    /// Primary activation; `force` skips the visibility precheck
    async fn click(&self, force: bool) -> BrowserResult<()>;
    async fn scroll_into_view(&self) -> BrowserResult<()>;
    async fn is_visible(&self) -> BrowserResult<bool>;
    async fn is_enabled(&self) -> BrowserResult<bool>;
    /// Call a JS function declaration with the element bound as `this`
    async fn evaluate(&self, function: &str) -> BrowserResult<serde_json::Value>;
}

#[async_trait]
pub trait BrowserSurface: Send + Sync {
    async fn navigate(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> BrowserResult<()>;
    async fn reload(&self, timeout: Duration) -> BrowserResult<()>;
    async fn content(&self) -> BrowserResult<String>;
    async fn title(&self) -> BrowserResult<Option<String>>;
    /// First element matching a selector strategy string
    async fn query(&self, selector: &str) -> BrowserResult<Option<Box<dyn SurfaceElement>>>;
    async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value>;
    async fn wait_for_load_state(&self, wait: WaitPolicy, timeout: Duration) -> BrowserResult<()>;
}

/// Proxy endpoint handed to a new session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProxySettings {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Launch parameters for one isolated session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub locale: String,
    pub proxy: Option<ProxySettings>,
    pub init_script: Option<String>,
    pub extra_args: Vec<String>,
    pub chrome_executable: Option<std::path::PathBuf>,
}

#[async_trait]
pub trait BrowserSession: Send {
    fn surface(&self) -> &dyn BrowserSurface;
    /// Tear the session down; must be called on every exit path
    async fn close(self: Box<Self>) -> BrowserResult<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open_session(&self, options: &SessionOptions) -> BrowserResult<Box<dyn BrowserSession>>;
}

/// `window.scrollBy(0, dy)`
pub async fn scroll_by(surface: &dyn BrowserSurface, dy: i64) -> BrowserResult<()> {
    surface.evaluate(&format!("window.scrollBy(0, {dy})")).await.map(|_| ())
}

/// Scroll to the bottom of the document
pub async fn scroll_to_bottom(surface: &dyn BrowserSurface) -> BrowserResult<()> {
    surface
        .evaluate("window.scrollTo(0, document.body.scrollHeight)")
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(BrowserError::SessionClosed("gone".into()).is_fatal());
        assert!(BrowserError::Launch("no chrome".into()).is_fatal());
        assert!(!BrowserError::Interaction("intercepted".into()).is_fatal());

        let timeout = BrowserError::timeout("navigate", Duration::from_secs(90));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_fatal());
        assert_eq!(timeout.to_string(), "Timed out after 90s during navigate");
    }
}
