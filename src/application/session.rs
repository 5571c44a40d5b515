//! Whole-session retry orchestration
//!
//! Every attempt runs in a fresh browser session. Attempts rotate through the
//! target URLs, switch to the proxy on retries, and back off exponentially
//! with jitter between failures or under-yielding runs.

#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use super::acquisition::PageAcquisitionPipeline;
use super::error::{ScrapeError, ScrapeResult};
use super::extractor::RecordExtractor;
use crate::domain::{HashtagRecord, SeenHashtags};
use crate::infrastructure::backoff::BackoffCalculator;
use crate::infrastructure::browser::{BrowserLauncher, BrowserSurface, ProxySettings, SessionOptions};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::pacing::{JitterWindow, Pacer};

/// What a single attempt should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptPlan {
    /// Zero-based attempt index
    pub index: u32,
    pub url: String,
    pub proxy: Option<ProxySettings>,
}

/// Runs one complete attempt and yields its records
#[async_trait]
pub trait SessionRunner: Send + Sync {
    async fn run_attempt(&self, plan: &AttemptPlan) -> ScrapeResult<Vec<HashtagRecord>>;
}

/// Production runner: launch, acquire, extract, always close
pub struct BrowserSessionRunner {
    launcher: Arc<dyn BrowserLauncher>,
    options: SessionOptions,
    pipeline: PageAcquisitionPipeline,
    extractor: Arc<RecordExtractor>,
    pacer: Arc<dyn Pacer>,
    pre_navigation_pause: JitterWindow,
    debug_dir: Option<PathBuf>,
}

impl BrowserSessionRunner {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        options: SessionOptions,
        pipeline: PageAcquisitionPipeline,
        extractor: Arc<RecordExtractor>,
        pacer: Arc<dyn Pacer>,
        pre_navigation_pause: JitterWindow,
        debug_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            launcher,
            options,
            pipeline,
            extractor,
            pacer,
            pre_navigation_pause,
            debug_dir,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        launcher: Arc<dyn BrowserLauncher>,
        extractor: Arc<RecordExtractor>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self::new(
            launcher,
            config.session_options(),
            PageAcquisitionPipeline::from_config(config, extractor.clone(), pacer.clone()),
            extractor,
            pacer,
            config.session.pre_navigation_pause,
            config.scraper.debug_capture.then(|| config.scraper.debug_dir.clone()),
        )
    }

    async fn drive(&self, surface: &dyn BrowserSurface, plan: &AttemptPlan) -> ScrapeResult<Vec<HashtagRecord>> {
        self.pacer.jitter(self.pre_navigation_pause).await;
        let page = self.pipeline.acquire(surface, &plan.url).await?;

        if let Some(dir) = &self.debug_dir {
            match write_debug_capture(dir, &page.html).await {
                Ok(path) => info!("💾 Saved page source to {:?}", path),
                Err(e) => warn!("⚠️  Failed to save page source: {}", e),
            }
        }

        let mut seen = SeenHashtags::new();
        Ok(self.extractor.extract(&page.html, &mut seen))
    }
}

#[async_trait]
impl SessionRunner for BrowserSessionRunner {
    async fn run_attempt(&self, plan: &AttemptPlan) -> ScrapeResult<Vec<HashtagRecord>> {
        let mut options = self.options.clone();
        options.proxy = plan.proxy.clone();

        let session = self.launcher.open_session(&options).await?;
        let surface = session.surface();
        let result = self.drive(surface, plan).await;

        if let Err(e) = session.close().await {
            warn!("⚠️  Browser session did not close cleanly: {}", e);
        }
        result
    }
}

/// `debug_<YYYYmmdd_HHMMSS>.html` in `dir`
async fn write_debug_capture(dir: &std::path::Path, html: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("debug_{}.html", Utc::now().format("%Y%m%d_%H%M%S")));
    tokio::fs::write(&path, html).await?;
    Ok(path)
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub records: Vec<HashtagRecord>,
    /// Page the kept records came from; `None` when nothing was kept
    pub source_url: Option<String>,
    pub attempts_used: u32,
    /// An attempt met the success threshold
    pub succeeded: bool,
}

pub struct SessionOrchestrator {
    runner: Arc<dyn SessionRunner>,
    targets: Vec<String>,
    proxy: Option<ProxySettings>,
    backoff: BackoffCalculator,
    success_threshold: usize,
    pacer: Arc<dyn Pacer>,
}

impl SessionOrchestrator {
    pub fn new(
        runner: Arc<dyn SessionRunner>,
        targets: Vec<String>,
        proxy: Option<ProxySettings>,
        backoff: BackoffCalculator,
        success_threshold: usize,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            runner,
            targets,
            proxy,
            backoff,
            success_threshold,
            pacer,
        }
    }

    pub fn from_config(config: &AppConfig, runner: Arc<dyn SessionRunner>, pacer: Arc<dyn Pacer>) -> Self {
        let proxy = if config.proxy.enable_on_retry {
            config.proxy.settings()
        } else {
            None
        };
        Self::new(
            runner,
            config.scraper.resolved_targets(),
            proxy,
            BackoffCalculator::new(config.session.backoff_policy()),
            config.session.success_threshold,
            pacer,
        )
    }

    /// Plan for attempt `index`: rotated target, proxy on retries only
    pub fn plan(&self, index: u32) -> Option<AttemptPlan> {
        if self.targets.is_empty() {
            return None;
        }
        let url = self.targets[index as usize % self.targets.len()].clone();
        let proxy = if index > 0 { self.proxy.clone() } else { None };
        Some(AttemptPlan { index, url, proxy })
    }

    pub async fn run(&self) -> ScrapeResult<SessionOutcome> {
        let max_attempts = self.backoff.policy().max_attempts.max(1);
        let mut latest_partial: Option<(Vec<HashtagRecord>, String)> = None;
        let mut last_error: Option<ScrapeError> = None;

        for attempt in 0..max_attempts {
            let plan = self
                .plan(attempt)
                .ok_or_else(|| ScrapeError::configuration("no target URLs configured"))?;
            info!(
                "🚀 Attempt {}/{} → {}{}",
                attempt + 1,
                max_attempts,
                plan.url,
                if plan.proxy.is_some() { " (via proxy)" } else { "" }
            );

            match self.runner.run_attempt(&plan).await {
                Ok(records) if records.len() >= self.success_threshold => {
                    info!("✅ Attempt {} yielded {} hashtags", attempt + 1, records.len());
                    return Ok(SessionOutcome {
                        records,
                        source_url: Some(plan.url),
                        attempts_used: attempt + 1,
                        succeeded: true,
                    });
                }
                Ok(records) => {
                    warn!(
                        "⚠️  Attempt {} yielded only {} hashtags (need {})",
                        attempt + 1,
                        records.len(),
                        self.success_threshold
                    );
                    if !records.is_empty() {
                        latest_partial = Some((records, plan.url));
                    }
                    last_error = None;
                }
                Err(e) if !e.is_retryable() => {
                    error!("❌ Attempt {} failed permanently: {}", attempt + 1, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("❌ Attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }

            if self.backoff.has_next(attempt) {
                let delay = self.backoff.delay(attempt);
                info!("⏳ Backing off {:.1}s before the next attempt", delay.as_secs_f64());
                self.pacer.pause(delay).await;
            }
        }

        if let Some((records, url)) = latest_partial {
            warn!("⚠️  Retries exhausted, keeping {} hashtags from the latest partial run", records.len());
            return Ok(SessionOutcome {
                records,
                source_url: Some(url),
                attempts_used: max_attempts,
                succeeded: false,
            });
        }
        if let Some(e) = last_error {
            return Err(e);
        }
        Ok(SessionOutcome {
            records: Vec::new(),
            source_url: None,
            attempts_used: max_attempts,
            succeeded: false,
        })
    }
}
