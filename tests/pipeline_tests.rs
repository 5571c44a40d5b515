//! End-to-end pipeline tests against in-memory browser and datastore doubles

use std::sync::Arc;
use std::time::Duration;

use hashtag_scout::application::{BrowserSessionRunner, RecordExtractor, SessionOrchestrator, Uploader};
use hashtag_scout::domain::{RunStatus, SeenHashtags};
use hashtag_scout::infrastructure::browser::BrowserError;
use hashtag_scout::infrastructure::pacing::Pacer;
use hashtag_scout::test_utils::{MockControl, MockDatastore, MockLauncher, MockSurface, RecordingPacer, ranking_page};
use hashtag_scout::{AppConfig, ScrapeRun};
use tempfile::TempDir;

fn test_config(debug_dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.session.backoff_jitter_secs = 0.0;
    config.scraper.debug_dir = debug_dir.path().to_path_buf();
    config
}

fn build_run(config: AppConfig, surfaces: Vec<MockSurface>, store: Arc<MockDatastore>) -> (ScrapeRun, Arc<MockLauncher>, Arc<RecordingPacer>) {
    build_run_shared(config, surfaces.into_iter().map(Arc::new).collect(), store)
}

fn build_run_shared(
    config: AppConfig,
    surfaces: Vec<Arc<MockSurface>>,
    store: Arc<MockDatastore>,
) -> (ScrapeRun, Arc<MockLauncher>, Arc<RecordingPacer>) {
    let launcher = Arc::new(MockLauncher::new(surfaces));
    let pacer = Arc::new(RecordingPacer::new());
    let shared_pacer: Arc<dyn Pacer> = pacer.clone();

    let extractor = Arc::new(RecordExtractor::from_config(&config).unwrap());
    let runner = Arc::new(BrowserSessionRunner::from_config(
        &config,
        launcher.clone(),
        extractor,
        shared_pacer.clone(),
    ));
    let orchestrator = SessionOrchestrator::from_config(&config, runner, shared_pacer);
    let uploader = Uploader::new(store, &config.upload);

    (ScrapeRun::new(config, orchestrator, Some(uploader)), launcher, pacer)
}

#[tokio::test]
async fn under_yielding_session_is_retried_in_a_fresh_browser() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MockDatastore::new());
    let (run, launcher, pacer) = build_run(
        test_config(&dir),
        vec![MockSurface::new(&ranking_page(3)), MockSurface::new(&ranking_page(15))],
        store.clone(),
    );

    let report = run.execute().await.unwrap();

    assert_eq!(report.metadata.status, RunStatus::Success);
    assert_eq!(report.records.len(), 15);
    assert_eq!(report.metadata.attempts_used, 2);
    assert_eq!(launcher.opened(), 2);
    assert_eq!(launcher.closed(), 2);
    // First retry backs off base * 2^0 with jitter disabled
    assert!(pacer.pauses().contains(&Duration::from_secs(2)));
    // Proxy is not configured, so no attempt gets one
    assert!(launcher.proxies().iter().all(Option::is_none));

    assert_eq!(store.rows().len(), 10);
    assert_eq!(report.metadata.uploaded, 10);
}

#[tokio::test]
async fn uploaded_rows_name_the_page_the_successful_attempt_loaded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let targets = config.scraper.resolved_targets();
    let store = Arc::new(MockDatastore::new());
    let (run, _, _) = build_run(
        config,
        vec![MockSurface::new(&ranking_page(4)), MockSurface::new(&ranking_page(12))],
        store.clone(),
    );

    run.execute().await.unwrap();

    let rows = store.rows();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r.metadata.source_url == targets[1]));
}

#[tokio::test]
async fn navigation_failures_exhaust_retries_and_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let failing = || {
        MockSurface::new(&ranking_page(40))
            .with_navigation_failure(BrowserError::navigation("https://example.com", "net::ERR_CONNECTION_RESET"))
    };
    let store = Arc::new(MockDatastore::new());
    let (run, launcher, _) = build_run(test_config(&dir), vec![failing(), failing(), failing()], store.clone());

    let err = run.execute().await.unwrap_err();

    assert!(err.to_string().contains("ERR_CONNECTION_RESET"));
    assert_eq!(launcher.opened(), 3);
    assert_eq!(launcher.closed(), 3);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn proxy_is_used_from_the_second_attempt() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.apply_overrides_from(|key| (key == "PROXY_SERVER").then(|| "http://proxy.local:3128".to_string()));

    let (run, launcher, _) = build_run(
        config,
        vec![MockSurface::new(&ranking_page(2)), MockSurface::new(&ranking_page(12))],
        Arc::new(MockDatastore::new()),
    );
    run.execute().await.unwrap();

    let proxies = launcher.proxies();
    assert!(proxies[0].is_none());
    assert_eq!(proxies[1].as_ref().map(|p| p.server.as_str()), Some("http://proxy.local:3128"));
}

#[tokio::test]
async fn debug_capture_writes_page_source() {
    let dir = TempDir::new().unwrap();
    let (run, _, _) = build_run(
        test_config(&dir),
        vec![MockSurface::new(&ranking_page(12))],
        Arc::new(MockDatastore::new()),
    );
    run.execute().await.unwrap();

    let files: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("debug_") && files[0].ends_with(".html"));
}

#[tokio::test]
async fn tab_selector_error_does_not_fail_the_attempt() {
    let dir = TempDir::new().unwrap();
    let songs_view = format!("<div>Trending songs</div>{}", ranking_page(12));
    let surface = MockSurface::new(&songs_view)
        .with_query_failure("text=Hashtags", BrowserError::Evaluation("Execution context was destroyed".into()))
        .with_control("[data-e2e='hashtag-tab']", MockControl::always());
    let (run, launcher, _) = build_run(test_config(&dir), vec![surface], Arc::new(MockDatastore::new()));

    let report = run.execute().await.unwrap();

    assert_eq!(report.metadata.status, RunStatus::Success);
    assert_eq!(report.metadata.attempts_used, 1);
    assert_eq!(launcher.opened(), 1);
}

#[tokio::test]
async fn view_more_selector_error_falls_through_to_later_selectors() {
    let dir = TempDir::new().unwrap();
    let surface = MockSurface::new(&ranking_page(12))
        .with_query_failure("text=/view more/i", BrowserError::Evaluation("Execution context was destroyed".into()))
        .with_control("button:has-text('View more')", MockControl::times(7));
    let surface = Arc::new(surface);
    let (run, _, _) = build_run_shared(test_config(&dir), vec![surface.clone()], Arc::new(MockDatastore::new()));

    let report = run.execute().await.unwrap();

    assert_eq!(report.metadata.status, RunStatus::Success);
    assert_eq!(report.records.len(), 12);
    assert_eq!(surface.clicks("button:has-text('View more')"), 7);
}

#[test]
fn seen_set_prevents_duplicates_across_extractions() {
    let extractor = RecordExtractor::from_config(&AppConfig::default()).unwrap();
    let mut seen = SeenHashtags::new();

    let first = extractor.extract(&ranking_page(10), &mut seen);
    let second = extractor.extract(&ranking_page(20), &mut seen);

    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 10);
    let mut all: Vec<&str> = first.iter().chain(&second).map(|r| r.hashtag.as_str()).collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 20);
}
