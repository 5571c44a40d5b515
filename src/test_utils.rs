//! Test utilities for hashtag-scout
//!
//! In-memory doubles for the browser, session runner, datastore and pacer
//! so pipeline tests run without Chrome, network or real sleeps.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::application::error::ScrapeResult;
use crate::application::session::{AttemptPlan, SessionRunner};
use crate::domain::{HashtagRecord, SentimentLabel};
use crate::infrastructure::browser::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, BrowserSurface, ProxySettings, SYNTHETIC_CLICK,
    SessionOptions, SurfaceElement, WaitPolicy,
};
use crate::infrastructure::datastore::{Datastore, DatastoreError, DatastoreResult, UploadRow};
use crate::infrastructure::pacing::Pacer;

/// Pacer that records requested waits instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.pauses.lock().unwrap().len()
    }

    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// Behaviour of a clickable control on a [`MockSurface`]
#[derive(Debug, Clone)]
pub struct MockControl {
    /// Clicks left before the control disappears; `None` never disappears
    remaining: Option<u32>,
    visible: bool,
    enabled: bool,
    click_fails: bool,
}

impl MockControl {
    pub fn always() -> Self {
        Self {
            remaining: None,
            visible: true,
            enabled: true,
            click_fails: false,
        }
    }

    /// Present until clicked `n` times
    pub fn times(n: u32) -> Self {
        Self {
            remaining: Some(n),
            ..Self::always()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Primary click errors; the synthetic click still works
    pub fn failing_click(mut self) -> Self {
        self.click_fails = true;
        self
    }
}

#[derive(Debug)]
struct ControlState {
    control: MockControl,
    clicks: usize,
    synthetic_clicks: usize,
}

impl ControlState {
    fn present(&self) -> bool {
        self.control.remaining != Some(0)
    }

    fn consume(&mut self) {
        if let Some(remaining) = self.control.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }
}

type Controls = Arc<Mutex<HashMap<String, ControlState>>>;

/// Scriptable in-memory page
#[derive(Default)]
pub struct MockSurface {
    /// Front is the current page; each reload advances while more remain
    pages: Mutex<VecDeque<String>>,
    title: Mutex<Option<String>>,
    controls: Controls,
    scripts: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    navigation_failures: Mutex<VecDeque<BrowserError>>,
    query_failures: Mutex<HashMap<String, BrowserError>>,
    fatal: Mutex<Option<BrowserError>>,
    reloads: AtomicUsize,
}

impl MockSurface {
    pub fn new(html: &str) -> Self {
        let surface = Self::default();
        surface.pages.lock().unwrap().push_back(html.to_string());
        *surface.title.lock().unwrap() = Some("Creative Center".to_string());
        surface
    }

    pub fn with_reload_pages(self, pages: Vec<String>) -> Self {
        self.pages.lock().unwrap().extend(pages);
        self
    }

    pub fn with_control(self, selector: &str, control: MockControl) -> Self {
        self.controls.lock().unwrap().insert(
            selector.to_string(),
            ControlState {
                control,
                clicks: 0,
                synthetic_clicks: 0,
            },
        );
        self
    }

    /// Next navigation fails with `error`; queued in call order
    pub fn with_navigation_failure(self, error: BrowserError) -> Self {
        self.navigation_failures.lock().unwrap().push_back(error);
        self
    }

    /// Every query for `selector` fails with `error`
    pub fn with_query_failure(self, selector: &str, error: BrowserError) -> Self {
        self.query_failures.lock().unwrap().insert(selector.to_string(), error);
        self
    }

    pub fn with_title(self, title: Option<&str>) -> Self {
        *self.title.lock().unwrap() = title.map(str::to_string);
        self
    }

    /// Every later call fails with `error`
    pub fn close_with(&self, error: BrowserError) {
        *self.fatal.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn clicks(&self, selector: &str) -> usize {
        self.controls.lock().unwrap().get(selector).map_or(0, |c| c.clicks)
    }

    pub fn synthetic_clicks(&self, selector: &str) -> usize {
        self.controls
            .lock()
            .unwrap()
            .get(selector)
            .map_or(0, |c| c.synthetic_clicks)
    }

    pub fn scripts_containing(&self, needle: &str) -> usize {
        self.scripts.lock().unwrap().iter().filter(|s| s.contains(needle)).count()
    }

    fn check(&self, call: String) -> BrowserResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.fatal.lock().unwrap().as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BrowserSurface for MockSurface {
    async fn navigate(&self, url: &str, wait: WaitPolicy, _timeout: Duration) -> BrowserResult<()> {
        self.check(format!("navigate {url} {wait:?}"))?;
        match self.navigation_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn reload(&self, _timeout: Duration) -> BrowserResult<()> {
        self.check("reload".to_string())?;
        self.reloads.fetch_add(1, Ordering::SeqCst);
        let mut pages = self.pages.lock().unwrap();
        if pages.len() > 1 {
            pages.pop_front();
        }
        Ok(())
    }

    async fn content(&self) -> BrowserResult<String> {
        self.check("content".to_string())?;
        Ok(self.pages.lock().unwrap().front().cloned().unwrap_or_default())
    }

    async fn title(&self) -> BrowserResult<Option<String>> {
        self.check("title".to_string())?;
        Ok(self.title.lock().unwrap().clone())
    }

    async fn query(&self, selector: &str) -> BrowserResult<Option<Box<dyn SurfaceElement>>> {
        self.check(format!("query {selector}"))?;
        if let Some(error) = self.query_failures.lock().unwrap().get(selector) {
            return Err(error.clone());
        }
        let present = self
            .controls
            .lock()
            .unwrap()
            .get(selector)
            .is_some_and(ControlState::present);
        Ok(present.then(|| {
            Box::new(MockElement {
                selector: selector.to_string(),
                controls: self.controls.clone(),
            }) as Box<dyn SurfaceElement>
        }))
    }

    async fn evaluate(&self, script: &str) -> BrowserResult<Value> {
        self.check("evaluate".to_string())?;
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(Value::Null)
    }

    async fn wait_for_load_state(&self, wait: WaitPolicy, _timeout: Duration) -> BrowserResult<()> {
        self.check(format!("wait {wait:?}"))
    }
}

struct MockElement {
    selector: String,
    controls: Controls,
}

impl MockElement {
    fn with_state<T>(&self, f: impl FnOnce(&mut ControlState) -> T) -> BrowserResult<T> {
        let mut controls = self.controls.lock().unwrap();
        controls
            .get_mut(&self.selector)
            .map(f)
            .ok_or_else(|| BrowserError::ElementNotFound {
                selector: self.selector.clone(),
            })
    }
}

#[async_trait]
impl SurfaceElement for MockElement {
    async fn click(&self, _force: bool) -> BrowserResult<()> {
        self.with_state(|state| {
            if state.control.click_fails {
                return Err(BrowserError::Interaction("click intercepted".to_string()));
            }
            state.clicks += 1;
            state.consume();
            Ok(())
        })?
    }

    async fn scroll_into_view(&self) -> BrowserResult<()> {
        Ok(())
    }

    async fn is_visible(&self) -> BrowserResult<bool> {
        self.with_state(|state| state.control.visible)
    }

    async fn is_enabled(&self) -> BrowserResult<bool> {
        self.with_state(|state| state.control.enabled)
    }

    async fn evaluate(&self, function: &str) -> BrowserResult<Value> {
        if function == SYNTHETIC_CLICK {
            self.with_state(|state| {
                state.synthetic_clicks += 1;
                state.consume();
            })?;
        }
        Ok(json!(null))
    }
}

/// Launcher handing out pre-built surfaces in order
pub struct MockLauncher {
    surfaces: Mutex<VecDeque<Arc<MockSurface>>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    proxies: Mutex<Vec<Option<ProxySettings>>>,
}

impl MockLauncher {
    pub fn new(surfaces: Vec<Arc<MockSurface>>) -> Self {
        Self {
            surfaces: Mutex::new(surfaces.into()),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            proxies: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn proxies(&self) -> Vec<Option<ProxySettings>> {
        self.proxies.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn open_session(&self, options: &SessionOptions) -> BrowserResult<Box<dyn BrowserSession>> {
        self.proxies.lock().unwrap().push(options.proxy.clone());
        let surface = self
            .surfaces
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BrowserError::Launch("no mock surface left".to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            surface,
            closed: self.closed.clone(),
        }))
    }
}

struct MockSession {
    surface: Arc<MockSurface>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for MockSession {
    fn surface(&self) -> &dyn BrowserSurface {
        self.surface.as_ref()
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Session runner replaying scripted attempt results
pub struct ScriptedRunner {
    results: Mutex<VecDeque<ScrapeResult<Vec<HashtagRecord>>>>,
    plans: Mutex<Vec<AttemptPlan>>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<ScrapeResult<Vec<HashtagRecord>>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            plans: Mutex::new(Vec::new()),
        }
    }

    pub fn plans(&self) -> Vec<AttemptPlan> {
        self.plans.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionRunner for ScriptedRunner {
    async fn run_attempt(&self, plan: &AttemptPlan) -> ScrapeResult<Vec<HashtagRecord>> {
        self.plans.lock().unwrap().push(plan.clone());
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Datastore collecting inserted chunks; selected calls fail
#[derive(Default)]
pub struct MockDatastore {
    calls: Mutex<Vec<(String, Vec<UploadRow>)>>,
    failing: HashSet<usize>,
}

impl MockDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-based insert calls that are rejected
    pub fn failing_calls(mut self, calls: &[usize]) -> Self {
        self.failing = calls.iter().copied().collect();
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<UploadRow>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Rows of every insert call, failed ones included
    pub fn rows(&self) -> Vec<UploadRow> {
        self.calls().into_iter().flat_map(|(_, rows)| rows).collect()
    }
}

#[async_trait]
impl Datastore for MockDatastore {
    async fn insert(&self, table: &str, rows: &[UploadRow]) -> DatastoreResult<usize> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((table.to_string(), rows.to_vec()));
            calls.len() - 1
        };
        if self.failing.contains(&index) {
            return Err(DatastoreError::Rejected {
                status: 500,
                body: "mock failure".to_string(),
            });
        }
        Ok(rows.len())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Two-letter alphabetic suffix for index `i` (`aa`, `ab`, ...)
fn letters(i: usize) -> String {
    let first = char::from(b'a' + ((i / 26) % 26) as u8);
    let second = char::from(b'a' + (i % 26) as u8);
    format!("{first}{second}")
}

/// Ranking page with `rows` distinct hashtag rows in the current layout
pub fn ranking_page(rows: usize) -> String {
    let body: String = (0..rows)
        .map(|i| {
            format!(
                "<div data-testid=\"hashtag_item_{i}\"><span>{rank}</span><span>#</span><span>tag{suffix}</span>\
                 <span>Music</span><span>{posts}K</span><span>Posts</span></div>",
                rank = i + 1,
                suffix = letters(i),
                posts = (rows - i) * 3,
            )
        })
        .collect();
    format!("<html><head><title>Popular hashtags</title></head><body>{body}</body></html>")
}

/// Record with the given hashtag and score, other fields neutral
pub fn record(hashtag: &str, score: f64) -> HashtagRecord {
    HashtagRecord {
        rank: None,
        hashtag: hashtag.to_string(),
        posts: None,
        views: None,
        category: "General".to_string(),
        engagement_score: score,
        sentiment_polarity: 0.0,
        sentiment_label: SentimentLabel::Neutral,
    }
}

/// `n` distinct records with descending scores
pub fn sample_records(n: usize) -> Vec<HashtagRecord> {
    (0..n)
        .map(|i| {
            let mut rec = record(&format!("#sample{}", letters(i)), 9.0 - (i as f64) * 0.1);
            rec.rank = u32::try_from(i + 1).ok();
            rec
        })
        .collect()
}
