//! Chromium implementation of the browser capability
//!
//! Every session launches its own browser process with a throwaway profile
//! directory, so no cookies or fingerprint state leak between attempts.

#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{AddScriptToEvaluateOnNewDocumentParams, NavigateParams};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, BrowserSurface, SelectorStrategy,
    SessionOptions, SurfaceElement, WaitPolicy,
};

/// Launch flags that hide the most obvious automation fingerprints
pub const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-site-isolation-trials",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-infobars",
    "--disable-extensions",
    "--disable-gpu",
    "--no-first-run",
];

const VISIBILITY_CHECK: &str = "function() {
    const r = this.getBoundingClientRect();
    const s = window.getComputedStyle(this);
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
}";

const ENABLED_CHECK: &str =
    "function() { return !this.disabled && this.getAttribute('aria-disabled') !== 'true'; }";

const NETWORK_IDLE_MS: u64 = 1000;

/// Launches one Chromium process per session
#[derive(Debug, Default, Clone)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }

    fn build_config(options: &SessionOptions, profile_dir: PathBuf) -> BrowserResult<BrowserConfig> {
        let (width, height) = options.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .user_data_dir(profile_dir)
            .args(STEALTH_ARGS.iter().copied())
            .arg(format!("--window-size={},{}", width, height))
            .arg(format!("--lang={}", options.locale))
            .arg(format!("--user-agent={}", options.user_agent))
            .args(options.extra_args.iter().map(String::as_str));

        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.server));
            if proxy.username.is_some() || proxy.password.is_some() {
                warn!("⚠️ Proxy credentials are not supported by the Chromium launcher; connecting without them");
            }
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn open_session(&self, options: &SessionOptions) -> BrowserResult<Box<dyn BrowserSession>> {
        let profile_dir = std::env::temp_dir().join(format!("hashtag-scout-{}", Uuid::new_v4()));
        let config = Self::build_config(options, profile_dir.clone())?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let message = e.to_string();
                    // Unknown CDP messages are harmless; a dead transport is not
                    if message.contains("connection closed") || message.contains("websocket closed") {
                        debug!("CDP handler stopping: {}", message);
                        break;
                    }
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                shutdown_browser(&mut browser, &handler_task, &profile_dir).await;
                return Err(map_cdp_error("open page", e));
            }
        };

        if let Some(script) = &options.init_script {
            if let Err(e) = page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(script.clone()))
                .await
            {
                shutdown_browser(&mut browser, &handler_task, &profile_dir).await;
                return Err(map_cdp_error("install init script", e));
            }
        }

        info!("🌐 Browser session opened (headless: {}, proxy: {})", options.headless, options.proxy.is_some());
        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
            surface: ChromiumSurface::new(page),
            profile_dir,
        }))
    }
}

async fn shutdown_browser(browser: &mut Browser, handler_task: &JoinHandle<()>, profile_dir: &Path) {
    if let Err(e) = browser.close().await {
        debug!("Browser close error (ignored): {}", e);
    }
    if let Err(e) = browser.wait().await {
        debug!("Browser wait error (ignored): {}", e);
    }
    handler_task.abort();
    if let Err(e) = tokio::fs::remove_dir_all(profile_dir).await {
        debug!("Profile cleanup skipped for {:?}: {}", profile_dir, e);
    }
}

struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    surface: ChromiumSurface,
    profile_dir: PathBuf,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn surface(&self) -> &dyn BrowserSurface {
        &self.surface
    }

    async fn close(mut self: Box<Self>) -> BrowserResult<()> {
        let session = &mut *self;
        shutdown_browser(&mut session.browser, &session.handler_task, &session.profile_dir).await;
        info!("🧹 Browser session closed");
        Ok(())
    }
}

struct ChromiumSurface {
    page: Page,
    marker_seq: AtomicU64,
}

impl ChromiumSurface {
    fn new(page: Page) -> Self {
        Self {
            page,
            marker_seq: AtomicU64::new(0),
        }
    }

    async fn eval_value(&self, script: &str) -> BrowserResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| map_cdp_error("evaluate", e))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Resolve a strategy string to a CSS selector for its first match
    async fn resolve(&self, selector: &str) -> BrowserResult<Option<String>> {
        let strategy = SelectorStrategy::parse(selector);
        match strategy {
            SelectorStrategy::Css(css) => Ok(Some(css)),
            other => {
                let marker = format!("m{}", self.marker_seq.fetch_add(1, Ordering::Relaxed));
                let count = self.eval_value(&other.marking_script(&marker, true)).await?;
                if count.as_u64().unwrap_or(0) == 0 {
                    Ok(None)
                } else {
                    Ok(Some(SelectorStrategy::marked_selector(&marker)))
                }
            }
        }
    }

    async fn wait_until(&self, condition: &str, timeout: Duration, operation: &str) -> BrowserResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.eval_value(condition).await?.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::timeout(operation, timeout));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Resource count stable for a second with `readyState == complete`
    async fn wait_for_network_idle(&self, timeout: Duration) -> BrowserResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_count = -1_i64;
        let mut stable_since: Option<tokio::time::Instant> = None;
        loop {
            let idle_state = self
                .eval_value(
                    "({ ready: document.readyState === 'complete', \
                        resources: performance.getEntriesByType('resource').length })",
                )
                .await?;
            let ready = idle_state.get("ready").and_then(serde_json::Value::as_bool).unwrap_or(false);
            let count = idle_state.get("resources").and_then(serde_json::Value::as_i64).unwrap_or(0);
            let now = tokio::time::Instant::now();

            if ready && count == last_count {
                let since = *stable_since.get_or_insert(now);
                if now.duration_since(since) >= Duration::from_millis(NETWORK_IDLE_MS) {
                    return Ok(());
                }
            } else {
                stable_since = None;
            }
            last_count = count;

            if now >= deadline {
                return Err(BrowserError::timeout("network idle", timeout));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

#[async_trait]
impl BrowserSurface for ChromiumSurface {
    async fn navigate(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> BrowserResult<()> {
        debug!("Navigating to {} (wait: {:?})", url, wait);
        let navigation = async {
            match wait {
                WaitPolicy::DomContentLoaded => {
                    self.page
                        .execute(NavigateParams::new(url))
                        .await
                        .map_err(|e| BrowserError::navigation(url, e))?;
                    self.wait_until("document.readyState !== 'loading'", timeout, "dom content loaded")
                        .await
                }
                WaitPolicy::Load | WaitPolicy::NetworkIdle => {
                    self.page.goto(url).await.map_err(|e| BrowserError::navigation(url, e))?;
                    if wait == WaitPolicy::NetworkIdle {
                        self.wait_for_network_idle(timeout).await?;
                    }
                    Ok(())
                }
            }
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| BrowserError::timeout("navigate", timeout))?
    }

    async fn reload(&self, timeout: Duration) -> BrowserResult<()> {
        tokio::time::timeout(timeout, self.page.reload())
            .await
            .map_err(|_| BrowserError::timeout("reload", timeout))?
            .map(|_| ())
            .map_err(|e| map_cdp_error("reload", e))
    }

    async fn content(&self) -> BrowserResult<String> {
        self.page.content().await.map_err(|e| map_cdp_error("content", e))
    }

    async fn title(&self) -> BrowserResult<Option<String>> {
        self.page.get_title().await.map_err(|e| map_cdp_error("title", e))
    }

    async fn query(&self, selector: &str) -> BrowserResult<Option<Box<dyn SurfaceElement>>> {
        let Some(css) = self.resolve(selector).await? else {
            return Ok(None);
        };
        match self.page.find_element(css).await {
            Ok(element) => Ok(Some(Box::new(ChromiumElement { element }))),
            Err(e) => {
                let error = map_cdp_error("query", e);
                if error.is_fatal() {
                    Err(error)
                } else {
                    Ok(None)
                }
            }
        }
    }

    async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value> {
        self.eval_value(script).await
    }

    async fn wait_for_load_state(&self, wait: WaitPolicy, timeout: Duration) -> BrowserResult<()> {
        match wait {
            WaitPolicy::DomContentLoaded => {
                self.wait_until("document.readyState !== 'loading'", timeout, "dom content loaded")
                    .await
            }
            WaitPolicy::Load => {
                self.wait_until("document.readyState === 'complete'", timeout, "load").await
            }
            WaitPolicy::NetworkIdle => self.wait_for_network_idle(timeout).await,
        }
    }
}

struct ChromiumElement {
    element: Element,
}

impl ChromiumElement {
    async fn call(&self, function: &str) -> BrowserResult<serde_json::Value> {
        let returns = self
            .element
            .call_js_fn(function, false)
            .await
            .map_err(|e| map_cdp_error("element script", e))?;
        Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl SurfaceElement for ChromiumElement {
    async fn click(&self, force: bool) -> BrowserResult<()> {
        if !force && !self.is_visible().await? {
            return Err(BrowserError::Interaction("element is not visible".into()));
        }
        self.element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| map_cdp_error("click", e))
    }

    async fn scroll_into_view(&self) -> BrowserResult<()> {
        self.element
            .scroll_into_view()
            .await
            .map(|_| ())
            .map_err(|e| map_cdp_error("scroll into view", e))
    }

    async fn is_visible(&self) -> BrowserResult<bool> {
        Ok(self.call(VISIBILITY_CHECK).await?.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self) -> BrowserResult<bool> {
        Ok(self.call(ENABLED_CHECK).await?.as_bool().unwrap_or(true))
    }

    async fn evaluate(&self, function: &str) -> BrowserResult<serde_json::Value> {
        self.call(function).await
    }
}

/// Classify a CDP error by its message
fn map_cdp_error(operation: &str, error: CdpError) -> BrowserError {
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("connection closed")
        || lower.contains("websocket")
        || lower.contains("channel closed")
        || lower.contains("target closed")
        || lower.contains("send error")
    {
        BrowserError::SessionClosed(format!("{operation}: {message}"))
    } else if lower.contains("timeout") || lower.contains("timed out") {
        BrowserError::Timeout {
            operation: operation.to_string(),
            timeout_secs: 0,
        }
    } else if operation == "evaluate" || operation == "element script" {
        BrowserError::Evaluation(message)
    } else {
        BrowserError::Interaction(format!("{operation}: {message}"))
    }
}
