//! Run-level entry point: metadata, orchestration, optional upload, report

#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::error::{ScrapeError, ScrapeResult};
use super::extractor::RecordExtractor;
use super::session::{BrowserSessionRunner, SessionOrchestrator};
use super::uploader::{UploadReport, Uploader};
use crate::domain::constants::site;
use crate::domain::{HashtagRecord, RunMetadata, RunStatus};
use crate::infrastructure::browser::ChromiumLauncher;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::datastore::{Datastore, DatastoreError, SqliteDatastore, SupabaseDatastore};
use crate::infrastructure::pacing::{Pacer, TokioPacer};

const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub records: Vec<HashtagRecord>,
    pub upload: Option<UploadReport>,
}

pub struct ScrapeRun {
    config: AppConfig,
    orchestrator: SessionOrchestrator,
    uploader: Option<Uploader>,
}

impl ScrapeRun {
    pub fn new(config: AppConfig, orchestrator: SessionOrchestrator, uploader: Option<Uploader>) -> Self {
        Self {
            config,
            orchestrator,
            uploader,
        }
    }

    /// Production wiring: Chromium sessions, real sleeps, configured datastore
    pub async fn from_config(config: AppConfig) -> ScrapeResult<Self> {
        let pacer: Arc<dyn Pacer> = Arc::new(TokioPacer);
        let extractor = Arc::new(RecordExtractor::from_config(&config)?);
        let runner = Arc::new(BrowserSessionRunner::from_config(
            &config,
            Arc::new(ChromiumLauncher::new()),
            extractor,
            pacer.clone(),
        ));
        let orchestrator = SessionOrchestrator::from_config(&config, runner, pacer);

        let uploader = if config.scraper.upload_enabled {
            match open_datastore(&config).await {
                Ok(store) => Some(Uploader::new(store, &config.upload)),
                Err(DatastoreError::NotConfigured(reason)) => {
                    warn!("⚠️  Upload disabled: {}", reason);
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        Ok(Self::new(config, orchestrator, uploader))
    }

    pub async fn execute(&self) -> ScrapeResult<RunReport> {
        let scraper = &self.config.scraper;
        let mut metadata = RunMetadata::start(
            site::PLATFORM,
            &scraper.region,
            scraper.headless,
            scraper.debug_capture,
            self.uploader.is_some(),
        );
        self.log_banner(&metadata);

        let outcome = match self.orchestrator.run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                metadata.finish(RunStatus::Failed, Some(e.to_string()));
                log_failure(&metadata);
                return Err(e);
            }
        };

        metadata.total_hashtags = outcome.records.len();
        metadata.attempts_used = outcome.attempts_used;

        if outcome.records.is_empty() {
            metadata.finish(RunStatus::Success, None);
            warn!("⚠️  No hashtags found; nothing to upload");
            log_summary(&metadata, &outcome.records);
            return Ok(RunReport {
                metadata,
                records: outcome.records,
                upload: None,
            });
        }

        let upload = match &self.uploader {
            Some(uploader) => {
                let source_url = outcome.source_url.as_deref().unwrap_or(site::SOURCE_URL);
                let report = uploader.upload(&outcome.records, source_url).await;
                metadata.uploaded = report.inserted;
                if !report.succeeded() {
                    warn!("⚠️  No rows were uploaded");
                }
                Some(report)
            }
            None => None,
        };

        metadata.finish(RunStatus::Success, None);
        log_summary(&metadata, &outcome.records);
        Ok(RunReport {
            metadata,
            records: outcome.records,
            upload,
        })
    }

    fn log_banner(&self, metadata: &RunMetadata) {
        info!("==============================================");
        info!("🎯 Hashtag Scout run {}", metadata.run_id);
        info!("   Platform:        {}", metadata.platform);
        info!("   Region:          {}", metadata.region);
        info!("   Started:         {}", metadata.started_at.to_rfc3339());
        info!("   Headless:        {}", metadata.headless);
        info!("   Debug capture:   {}", metadata.debug_capture);
        info!("   Upload:          {}", metadata.upload_enabled);
        info!("   Max attempts:    {}", self.config.session.max_attempts);
        info!("   View more clicks: {}", self.config.acquisition.primary_clicks);
        info!("==============================================");
    }
}

async fn open_datastore(config: &AppConfig) -> Result<Arc<dyn Datastore>, DatastoreError> {
    let upload = &config.upload;
    if let Some(path) = &upload.sqlite_path {
        return Ok(Arc::new(SqliteDatastore::open(path).await?));
    }
    let store = SupabaseDatastore::from_settings(
        upload.supabase_url.as_deref(),
        upload.supabase_key.as_deref(),
        std::time::Duration::from_secs(upload.request_timeout_secs),
    )?;
    Ok(Arc::new(store))
}

fn log_summary(metadata: &RunMetadata, records: &[HashtagRecord]) {
    info!("==============================================");
    info!("🏁 Run {} completed", metadata.run_id);
    info!("   Duration:   {:.1}s", metadata.duration_secs.unwrap_or_default());
    info!("   Hashtags:   {}", metadata.total_hashtags);
    info!("   Attempts:   {}", metadata.attempts_used);
    info!("   Uploaded:   {}", metadata.uploaded);
    info!("   Sample:");
    for record in records.iter().take(SAMPLE_SIZE) {
        info!("     {}", sample_line(record));
    }
    info!("==============================================");
}

fn log_failure(metadata: &RunMetadata) {
    error!("==============================================");
    error!("💥 Run {} failed", metadata.run_id);
    error!("   Duration:   {:.1}s", metadata.duration_secs.unwrap_or_default());
    error!("   Error:      {}", metadata.error.as_deref().unwrap_or("unknown"));
    error!("==============================================");
}

/// `#tag - 12K Posts - Score: 7.5`
pub fn sample_line(record: &HashtagRecord) -> String {
    format!(
        "{} - {} Posts - Score: {}",
        record.hashtag,
        record.posts.as_deref().unwrap_or("N/A"),
        record.engagement_score
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::browser::BrowserError;
    use crate::test_utils::{MockDatastore, RecordingPacer, ScriptedRunner, record, sample_records};

    fn run_with(results: Vec<ScrapeResult<Vec<HashtagRecord>>>, store: Option<Arc<MockDatastore>>) -> ScrapeRun {
        let mut config = AppConfig::default();
        config.session.backoff_jitter_secs = 0.0;
        let orchestrator = SessionOrchestrator::from_config(
            &config,
            Arc::new(ScriptedRunner::new(results)),
            Arc::new(RecordingPacer::new()),
        );
        let uploader = store.map(|s| Uploader::new(s, &config.upload));
        ScrapeRun::new(config, orchestrator, uploader)
    }

    #[test]
    fn test_sample_line_format() {
        let mut rec = record("#music", 8.9);
        rec.posts = Some("12K".into());
        assert_eq!(sample_line(&rec), "#music - 12K Posts - Score: 8.9");
        assert_eq!(sample_line(&record("#dance", 6.0)), "#dance - N/A Posts - Score: 6");
    }

    #[tokio::test]
    async fn test_successful_run_uploads_top_records() {
        let store = Arc::new(MockDatastore::new());
        let report = run_with(vec![Ok(sample_records(15))], Some(store.clone()))
            .execute()
            .await
            .unwrap();

        assert_eq!(report.metadata.status, RunStatus::Success);
        assert_eq!(report.metadata.total_hashtags, 15);
        assert_eq!(report.metadata.attempts_used, 1);
        assert_eq!(report.metadata.uploaded, 10);
        assert!(report.metadata.upload_enabled);
        assert!(report.metadata.finished_at.is_some());
        assert_eq!(store.rows().len(), 10);
    }

    #[tokio::test]
    async fn test_run_without_uploader_skips_upload() {
        let report = run_with(vec![Ok(sample_records(12))], None).execute().await.unwrap();
        assert!(report.upload.is_none());
        assert!(!report.metadata.upload_enabled);
        assert_eq!(report.metadata.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_empty_run_is_a_successful_run_with_no_result() {
        let store = Arc::new(MockDatastore::new());
        let report = run_with(vec![Ok(vec![]), Ok(vec![]), Ok(vec![])], Some(store.clone()))
            .execute()
            .await
            .unwrap();
        assert_eq!(report.metadata.status, RunStatus::Success);
        assert_eq!(report.metadata.total_hashtags, 0);
        assert_eq!(report.metadata.attempts_used, 3);
        assert!(report.metadata.error.is_none());
        assert!(report.records.is_empty());
        assert!(report.upload.is_none());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_orchestrator_error_propagates() {
        let failure = || Err(ScrapeError::Browser(BrowserError::Launch("no chrome".into())));
        let err = run_with(vec![failure(), failure(), failure()], None)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Browser(BrowserError::Launch(_))));
    }
}
