//! Page acquisition state machine
//!
//! ```text
//! Navigating -> TabSelect -> ScrollLoad -> Parse -> Accept
//!                   ^                        |
//!                   +----- ReloadRetry <-----+  (too few rows, passes left)
//! ```
//!
//! A page that stays under the row threshold after the last pass is still
//! accepted; the caller decides whether the yield is good enough.

#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{ScrapeError, ScrapeResult};
use super::extractor::RecordExtractor;
use super::interaction::InteractionRetryController;
use crate::domain::constants::site::HASHTAG_CONTENT_MARKER;
use crate::infrastructure::browser::{self, BrowserResult, BrowserSurface, WaitPolicy};
use crate::infrastructure::config::{AcquisitionConfig, AppConfig};
use crate::infrastructure::pacing::Pacer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcquisitionState {
    Navigating,
    TabSelect,
    ScrollLoad,
    Parse,
    ReloadRetry,
    Accept,
}

/// Rendered page source after the last pass
#[derive(Debug, Clone)]
pub struct AcquiredPage {
    pub html: String,
    pub candidates: usize,
    pub passes: u32,
    pub clicks: u32,
}

pub struct PageAcquisitionPipeline {
    settings: AcquisitionConfig,
    tab_chain: Vec<String>,
    view_more_chain: Vec<String>,
    navigation_timeout: Duration,
    controller: InteractionRetryController,
    extractor: Arc<RecordExtractor>,
    pacer: Arc<dyn Pacer>,
}

impl PageAcquisitionPipeline {
    pub fn new(
        settings: AcquisitionConfig,
        tab_chain: Vec<String>,
        view_more_chain: Vec<String>,
        navigation_timeout: Duration,
        controller: InteractionRetryController,
        extractor: Arc<RecordExtractor>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            settings,
            tab_chain,
            view_more_chain,
            navigation_timeout,
            controller,
            extractor,
            pacer,
        }
    }

    pub fn from_config(config: &AppConfig, extractor: Arc<RecordExtractor>, pacer: Arc<dyn Pacer>) -> Self {
        Self::new(
            config.acquisition.clone(),
            config.selectors.hashtag_tab.clone(),
            config.selectors.view_more_button.clone(),
            config.scraper.navigation_timeout(),
            InteractionRetryController::new(config.interaction.clone(), pacer.clone()),
            extractor,
            pacer,
        )
    }

    pub async fn acquire(&self, surface: &dyn BrowserSurface, url: &str) -> ScrapeResult<AcquiredPage> {
        let mut state = AcquisitionState::Navigating;
        let mut passes = 0u32;
        let mut clicks = 0u32;
        let mut html = String::new();
        let mut candidates = 0usize;

        loop {
            debug!("Acquisition state: {:?}", state);
            state = match state {
                AcquisitionState::Navigating => {
                    self.navigate(surface, url).await?;
                    self.wait_for_page_load(surface).await?;
                    AcquisitionState::TabSelect
                }
                AcquisitionState::TabSelect => {
                    self.ensure_hashtag_tab(surface).await?;
                    self.pacer.jitter(self.settings.settle_wait).await;
                    AcquisitionState::ScrollLoad
                }
                AcquisitionState::ScrollLoad => {
                    clicks += self.scroll_load(surface).await?;
                    AcquisitionState::Parse
                }
                AcquisitionState::Parse => {
                    passes += 1;
                    html = surface.content().await?;
                    candidates = self.extractor.candidate_count(&html);
                    info!("📄 Pass {}: {} candidate rows", passes, candidates);

                    if candidates >= self.settings.accept_threshold {
                        AcquisitionState::Accept
                    } else if passes < self.settings.max_passes {
                        warn!(
                            "⚠️  Only {} rows (need {}), reloading for another pass",
                            candidates, self.settings.accept_threshold
                        );
                        AcquisitionState::ReloadRetry
                    } else {
                        warn!("⚠️  Accepting {} rows after {} passes", candidates, passes);
                        AcquisitionState::Accept
                    }
                }
                AcquisitionState::ReloadRetry => {
                    surface
                        .reload(Duration::from_secs(self.settings.reload_timeout_secs))
                        .await?;
                    self.pacer.jitter(self.settings.reload_settle_wait).await;
                    AcquisitionState::TabSelect
                }
                AcquisitionState::Accept => {
                    return Ok(AcquiredPage {
                        html,
                        candidates,
                        passes,
                        clicks,
                    });
                }
            };
        }
    }

    /// Strict network-idle navigation, relaxed to DOM-content-loaded on timeout
    async fn navigate(&self, surface: &dyn BrowserSurface, url: &str) -> ScrapeResult<()> {
        info!("🌐 Navigating to {}", url);
        match surface.navigate(url, WaitPolicy::NetworkIdle, self.navigation_timeout).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_timeout() => {
                warn!("⚠️  Network idle wait timed out, retrying with DOM content loaded");
                surface
                    .navigate(url, WaitPolicy::DomContentLoaded, self.navigation_timeout)
                    .await
                    .map_err(|e| ScrapeError::navigation(url, e))
            }
            Err(e) => Err(ScrapeError::navigation(url, e)),
        }
    }

    async fn wait_for_page_load(&self, surface: &dyn BrowserSurface) -> BrowserResult<()> {
        let mut titled = false;
        for _ in 0..self.settings.title_poll_secs {
            if surface.title().await?.is_some_and(|t| !t.trim().is_empty()) {
                titled = true;
                break;
            }
            self.pacer.pause(Duration::from_secs(1)).await;
        }
        if !titled {
            warn!("⚠️  Page title still empty after {}s", self.settings.title_poll_secs);
        }

        let body_timeout = Duration::from_secs(self.settings.body_wait_timeout_secs);
        if let Err(e) = surface.wait_for_load_state(WaitPolicy::DomContentLoaded, body_timeout).await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!("⚠️  Document body not ready: {}", e);
        }
        self.pacer.jitter(self.settings.settle_wait).await;

        let content = surface.content().await?;
        if content.to_lowercase().contains(HASHTAG_CONTENT_MARKER) {
            info!("✅ Hashtag content detected");
        } else {
            warn!("⚠️  No hashtag content detected in the initial page");
        }
        Ok(())
    }

    /// Switch away from a wrong view by clicking the first tab selector found.
    ///
    /// Returns whether a tab was clicked.
    async fn ensure_hashtag_tab(&self, surface: &dyn BrowserSurface) -> BrowserResult<bool> {
        let content = surface.content().await?.to_lowercase();
        let wrong_view = self
            .settings
            .wrong_view_fingerprints
            .iter()
            .any(|fingerprint| content.contains(&fingerprint.to_lowercase()));
        if !wrong_view {
            debug!("Already on the hashtag view");
            return Ok(false);
        }

        warn!("⚠️  Landed on the songs view, switching to hashtags");
        for selector in &self.tab_chain {
            let tab = match surface.query(selector).await {
                Ok(Some(tab)) => tab,
                Ok(None) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("Hashtag tab selector '{}' failed: {}", selector, e);
                    continue;
                }
            };

            if let Err(e) = tab.click(false).await {
                if e.is_fatal() {
                    return Err(e);
                }
                debug!("Hashtag tab '{}' click failed: {}", selector, e);
                continue;
            }

            let load_timeout = Duration::from_secs(self.settings.load_state_timeout_secs);
            if let Err(e) = surface.wait_for_load_state(WaitPolicy::NetworkIdle, load_timeout).await {
                if e.is_fatal() {
                    return Err(e);
                }
                debug!("Load state wait after tab click: {}", e);
            }
            self.pacer.jitter(self.settings.settle_wait).await;
            info!("✅ Switched to hashtag tab via '{}'", selector);
            return Ok(true);
        }

        warn!("⚠️  No hashtag tab selector could be clicked");
        Ok(false)
    }

    /// Scroll and expand the list; returns the number of View more clicks
    async fn scroll_load(&self, surface: &dyn BrowserSurface) -> BrowserResult<u32> {
        let s = &self.settings;

        for _ in 0..s.initial_scrolls {
            tolerate(browser::scroll_by(surface, s.initial_scroll_px).await)?;
            self.pacer.jitter(s.scroll_wait).await;
        }

        let mut clicks = self
            .controller
            .activate_more(surface, s.primary_clicks, &self.view_more_chain)
            .await?
            .clicks;

        for i in 0..s.bottom_scrolls {
            tolerate(browser::scroll_to_bottom(surface).await)?;
            self.pacer.jitter(s.bottom_scroll_wait).await;

            if s.bottom_click_every > 0 && i > 0 && i % s.bottom_click_every == 0 {
                clicks += self
                    .controller
                    .activate_more(surface, s.bottom_clicks, &self.view_more_chain)
                    .await?
                    .clicks;
            }
        }

        self.pacer.jitter(s.final_wait).await;
        info!("📜 Scroll load finished with {} View more clicks", clicks);
        Ok(clicks)
    }
}

/// Swallow non-fatal errors from best-effort page actions
fn tolerate(result: BrowserResult<()>) -> BrowserResult<()> {
    match result {
        Err(e) if !e.is_fatal() => {
            debug!("Ignoring page action failure: {}", e);
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::browser::BrowserError;
    use crate::test_utils::{MockControl, MockSurface, RecordingPacer, ranking_page};

    fn pipeline(config: &AppConfig) -> PageAcquisitionPipeline {
        let extractor = Arc::new(RecordExtractor::from_config(config).unwrap());
        PageAcquisitionPipeline::from_config(config, extractor, Arc::new(RecordingPacer::new()))
    }

    #[tokio::test]
    async fn test_full_page_is_accepted_on_first_pass() {
        let config = AppConfig::default();
        let surface = MockSurface::new(&ranking_page(35));

        let page = pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap();

        assert_eq!(page.passes, 1);
        assert_eq!(page.candidates, 35);
        assert_eq!(surface.reloads(), 0);
        // 8 initial scrolls, 15 bottom scrolls
        assert_eq!(surface.scripts_containing("scrollBy(0, 500)"), 8);
        assert_eq!(surface.scripts_containing("scrollTo(0, document.body.scrollHeight)"), 15);
    }

    #[tokio::test]
    async fn test_thin_page_is_reloaded_then_accepted() {
        let config = AppConfig::default();
        let surface = MockSurface::new(&ranking_page(5)).with_reload_pages(vec![ranking_page(40)]);

        let page = pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap();

        assert_eq!(page.passes, 2);
        assert_eq!(page.candidates, 40);
        assert_eq!(surface.reloads(), 1);
    }

    #[tokio::test]
    async fn test_degrades_gracefully_after_last_pass() {
        let config = AppConfig::default();
        let surface = MockSurface::new(&ranking_page(5));

        let page = pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap();

        assert_eq!(page.passes, 2);
        assert_eq!(page.candidates, 5);
        assert_eq!(surface.reloads(), 1);
    }

    #[tokio::test]
    async fn test_navigation_timeout_falls_back_to_dom_content_loaded() {
        let config = AppConfig::default();
        let surface = MockSurface::new(&ranking_page(35))
            .with_navigation_failure(BrowserError::timeout("navigate", Duration::from_secs(90)));

        pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap();

        let navigations: Vec<String> = surface.calls().into_iter().filter(|c| c.starts_with("navigate")).collect();
        assert_eq!(navigations.len(), 2);
        assert!(navigations[0].ends_with("NetworkIdle"));
        assert!(navigations[1].ends_with("DomContentLoaded"));
    }

    #[tokio::test]
    async fn test_missing_title_is_polled_then_tolerated() {
        let config = AppConfig::default();
        let pacer = Arc::new(RecordingPacer::new());
        let extractor = Arc::new(RecordExtractor::from_config(&config).unwrap());
        let pipeline = PageAcquisitionPipeline::from_config(&config, extractor, pacer.clone());
        let surface = MockSurface::new(&ranking_page(35)).with_title(None);

        let page = pipeline.acquire(&surface, "https://example.com/hashtag").await.unwrap();

        assert_eq!(page.passes, 1);
        let one_second_polls = pacer
            .pauses()
            .iter()
            .filter(|d| **d == Duration::from_secs(1))
            .count();
        assert!(one_second_polls >= config.acquisition.title_poll_secs as usize);
    }

    #[tokio::test]
    async fn test_navigation_error_propagates() {
        let config = AppConfig::default();
        let surface = MockSurface::new(&ranking_page(35))
            .with_navigation_failure(BrowserError::navigation("https://example.com/hashtag", "net::ERR_NAME_NOT_RESOLVED"));

        let err = pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_wrong_view_clicks_hashtag_tab() {
        let config = AppConfig::default();
        let html = format!("<p>Trending songs</p>{}", ranking_page(35));
        let surface = MockSurface::new(&html).with_control("[data-e2e='hashtag-tab']", MockControl::always());

        pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap();
        assert_eq!(surface.clicks("[data-e2e='hashtag-tab']"), 1);
    }

    #[tokio::test]
    async fn test_erroring_tab_selector_falls_through_to_the_next() {
        let config = AppConfig::default();
        let html = format!("<p>Trending songs</p>{}", ranking_page(35));
        let surface = MockSurface::new(&html)
            .with_query_failure("text=Hashtags", BrowserError::Evaluation("Execution context was destroyed".into()))
            .with_control("[data-e2e='hashtag-tab']", MockControl::always());

        let page = pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap();
        assert_eq!(page.candidates, 35);
        assert_eq!(surface.clicks("[data-e2e='hashtag-tab']"), 1);
    }

    #[tokio::test]
    async fn test_failed_tab_click_tries_the_next_selector() {
        let config = AppConfig::default();
        let html = format!("<p>Trending songs</p>{}", ranking_page(35));
        let surface = MockSurface::new(&html)
            .with_control("text=Hashtags", MockControl::always().failing_click())
            .with_control("[data-e2e='hashtag-tab']", MockControl::always());

        pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap();
        assert_eq!(surface.clicks("text=Hashtags"), 0);
        assert_eq!(surface.clicks("[data-e2e='hashtag-tab']"), 1);
    }

    #[tokio::test]
    async fn test_view_more_clicks_are_counted() {
        let config = AppConfig::default();
        let surface =
            MockSurface::new(&ranking_page(35)).with_control(".view-more-btn", MockControl::times(6));

        let page = pipeline(&config).acquire(&surface, "https://example.com/hashtag").await.unwrap();
        assert_eq!(page.clicks, 6);
    }
}
