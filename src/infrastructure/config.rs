//! Configuration infrastructure
//!
//! Contains configuration loading and management for the hashtag scraper.
//!
//! Configuration is layered:
//! 1. Built-in defaults (`defaults` module)
//! 2. JSON config file managed by [`ConfigManager`]
//! 3. Environment overrides (datastore credentials, proxy)
//! 4. Command line flags (applied by the binary)

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::derivable_impls)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::domain::constants::site;
use crate::domain::{CategoryTable, ScoringPolicy, SentimentMode};
use crate::infrastructure::backoff::BackoffPolicy;
use crate::infrastructure::browser::{ProxySettings, SessionOptions};
use crate::infrastructure::pacing::JitterWindow;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub selectors: SelectorConfig,
    pub extraction: ExtractionConfig,
    pub interaction: InteractionConfig,
    pub acquisition: AcquisitionConfig,
    pub session: SessionConfig,
    pub upload: UploadConfig,
    pub proxy: ProxyConfig,
    pub logging: LoggingConfig,
}

/// Run-level toggles and browser identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Region code substituted into the target URL templates
    pub region: String,
    pub headless: bool,
    /// Write the final page source to `debug_<timestamp>.html`
    pub debug_capture: bool,
    pub debug_dir: PathBuf,
    pub upload_enabled: bool,
    /// Target URL templates with a `{region}` placeholder, rotated per attempt
    pub target_urls: Vec<String>,
    pub navigation_timeout_secs: u64,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    pub chrome_executable: Option<PathBuf>,
    /// Install the automation-masking init script in every session
    pub stealth_script: bool,
}

/// Ordered selector fallback chains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub hashtag_tab: Vec<String>,
    pub view_more_button: Vec<String>,
    pub hashtag_item: Vec<String>,
}

/// Record extraction and scoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub scoring_policy: ScoringPolicy,
    pub sentiment: SentimentMode,
    /// Fragments of adjacent-panel song titles that must never become hashtags
    pub song_blocklist: Vec<String>,
    pub categories: CategoryTable,
}

/// "View more" activation loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Consecutive not-found attempts before giving up
    pub failure_patience: u32,
    pub not_found_wait: JitterWindow,
    pub pre_click_wait: JitterWindow,
    pub post_click_wait: JitterWindow,
    /// Every n-th click triggers an auxiliary scroll
    pub aux_scroll_every: u32,
    pub aux_scroll_px: i64,
    pub aux_scroll_wait: JitterWindow,
}

/// Page acquisition state machine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub accept_threshold: usize,
    pub max_passes: u32,
    pub title_poll_secs: u32,
    pub body_wait_timeout_secs: u64,
    pub load_state_timeout_secs: u64,
    pub reload_timeout_secs: u64,
    pub wrong_view_fingerprints: Vec<String>,
    pub settle_wait: JitterWindow,
    pub reload_settle_wait: JitterWindow,
    pub initial_scrolls: u32,
    pub initial_scroll_px: i64,
    pub scroll_wait: JitterWindow,
    pub primary_clicks: u32,
    pub bottom_scrolls: u32,
    pub bottom_scroll_wait: JitterWindow,
    /// Every n-th bottom scroll runs a short activation burst
    pub bottom_click_every: u32,
    pub bottom_clicks: u32,
    pub final_wait: JitterWindow,
}

/// Whole-session retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_attempts: u32,
    pub base_backoff_secs: f64,
    pub backoff_jitter_secs: f64,
    pub max_backoff_secs: f64,
    /// Minimum record count that ends the retry loop
    pub success_threshold: usize,
    pub pre_navigation_pause: JitterWindow,
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub table: String,
    pub chunk_size: usize,
    /// Upload only the best `top_n` records by engagement score
    pub top_n: Option<usize>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    /// Write to a local SQLite file instead of the remote datastore
    pub sqlite_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Route retry attempts (never the first one) through the proxy
    pub enable_on_retry: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub file_name: String,
    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,
    pub auto_cleanup_logs: bool,
    pub keep_only_latest: bool,
    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            region: defaults::REGION.to_string(),
            headless: true,
            debug_capture: true,
            debug_dir: PathBuf::from("."),
            upload_enabled: true,
            target_urls: site::TARGET_URL_TEMPLATES.iter().map(|s| s.to_string()).collect(),
            navigation_timeout_secs: defaults::NAVIGATION_TIMEOUT_SECS,
            user_agent: defaults::USER_AGENT.to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            locale: "en-US".to_string(),
            chrome_executable: None,
            stealth_script: true,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            hashtag_tab: to_strings(defaults::HASHTAG_TAB_SELECTORS),
            view_more_button: to_strings(defaults::VIEW_MORE_SELECTORS),
            hashtag_item: to_strings(defaults::HASHTAG_ITEM_SELECTORS),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            scoring_policy: ScoringPolicy::default(),
            sentiment: SentimentMode::default(),
            song_blocklist: to_strings(defaults::SONG_BLOCKLIST),
            categories: CategoryTable::default(),
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            failure_patience: defaults::FAILURE_PATIENCE,
            not_found_wait: JitterWindow::new(1.5, 3.0),
            pre_click_wait: JitterWindow::new(0.8, 1.5),
            post_click_wait: JitterWindow::new(4.0, 7.0),
            aux_scroll_every: 5,
            aux_scroll_px: 300,
            aux_scroll_wait: JitterWindow::new(1.5, 3.0),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            accept_threshold: defaults::ACCEPT_THRESHOLD,
            max_passes: defaults::MAX_PAGE_PASSES,
            title_poll_secs: 30,
            body_wait_timeout_secs: 30,
            load_state_timeout_secs: 15,
            reload_timeout_secs: 60,
            wrong_view_fingerprints: to_strings(defaults::WRONG_VIEW_FINGERPRINTS),
            settle_wait: JitterWindow::new(3.0, 6.0),
            reload_settle_wait: JitterWindow::new(8.0, 12.0),
            initial_scrolls: 8,
            initial_scroll_px: 500,
            scroll_wait: JitterWindow::new(0.8, 1.5),
            primary_clicks: defaults::MAX_VIEW_MORE_CLICKS,
            bottom_scrolls: 15,
            bottom_scroll_wait: JitterWindow::new(1.2, 2.0),
            bottom_click_every: 5,
            bottom_clicks: 10,
            final_wait: JitterWindow::new(5.0, 8.0),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_SESSION_ATTEMPTS,
            base_backoff_secs: defaults::BASE_BACKOFF_SECS,
            backoff_jitter_secs: 1.0,
            max_backoff_secs: 120.0,
            success_threshold: defaults::SUCCESS_THRESHOLD,
            pre_navigation_pause: JitterWindow::new(0.1, 0.3),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            table: defaults::UPLOAD_TABLE.to_string(),
            chunk_size: defaults::UPLOAD_CHUNK_SIZE,
            top_n: Some(defaults::UPLOAD_TOP_N),
            supabase_url: None,
            supabase_key: None,
            sqlite_path: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            server: None,
            username: None,
            password: None,
            enable_on_retry: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: true,
            keep_only_latest: false,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("chromiumoxide".to_string(), "warn".to_string());
                filters.insert("tungstenite".to_string(), "warn".to_string());
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl ScraperConfig {
    /// Target URLs with the region substituted
    pub fn resolved_targets(&self) -> Vec<String> {
        self.target_urls
            .iter()
            .map(|template| template.replace("{region}", &self.region))
            .collect()
    }

    pub fn navigation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.navigation_timeout_secs)
    }
}

impl SessionConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            base_delay_secs: self.base_backoff_secs,
            backoff_multiplier: 2.0,
            jitter_secs: self.backoff_jitter_secs,
            max_delay_secs: self.max_backoff_secs,
        }
    }
}

impl ProxyConfig {
    pub fn settings(&self) -> Option<ProxySettings> {
        self.server
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .map(|server| ProxySettings {
                server: server.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            })
    }
}

impl AppConfig {
    /// Apply the process environment on top of the loaded file
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(env_keys::SUPABASE_URL) {
            self.upload.supabase_url = Some(url);
        }
        if let Some(key) = get(env_keys::SUPABASE_KEY) {
            self.upload.supabase_key = Some(key);
        }
        if let Some(server) = get(env_keys::PROXY_SERVER) {
            self.proxy.server = Some(server);
        }
        if let Some(username) = get(env_keys::PROXY_USERNAME) {
            self.proxy.username = Some(username);
        }
        if let Some(password) = get(env_keys::PROXY_PASSWORD) {
            self.proxy.password = Some(password);
        }
    }

    /// Browser launch options; the proxy is attached by the orchestrator per attempt
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            headless: self.scraper.headless,
            user_agent: self.scraper.user_agent.clone(),
            viewport: (self.scraper.viewport_width, self.scraper.viewport_height),
            locale: self.scraper.locale.clone(),
            proxy: None,
            init_script: self.scraper.stealth_script.then(|| defaults::STEALTH_INIT_SCRIPT.to_string()),
            extra_args: Vec::new(),
            chrome_executable: self.scraper.chrome_executable.clone(),
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the default configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Manager for the default config file location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    /// Manager for an explicit config file
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the configuration, creating a default file on first run.
    ///
    /// Missing sections are filled from defaults. A file that cannot be
    /// parsed is backed up next to itself and replaced by defaults.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("🎉 Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration file could not be parsed: {}", parse_error);
                warn!("⚠️  Resetting to default configuration");

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

/// Environment variable names
pub mod env_keys {
    pub const SUPABASE_URL: &str = "SUPABASE_URL";
    pub const SUPABASE_KEY: &str = "SUPABASE_KEY";
    pub const PROXY_SERVER: &str = "PROXY_SERVER";
    pub const PROXY_USERNAME: &str = "PROXY_USERNAME";
    pub const PROXY_PASSWORD: &str = "PROXY_PASSWORD";
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "hashtag-scout";
    pub const CONFIG_FILE_NAME: &str = "hashtag_scout_config.json";

    pub const REGION: &str = "en";
    pub const NAVIGATION_TIMEOUT_SECS: u64 = 90;
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    /// Cap on "View more" clicks in the main activation pass
    pub const MAX_VIEW_MORE_CLICKS: u32 = 25;
    pub const FAILURE_PATIENCE: u32 = 3;

    pub const ACCEPT_THRESHOLD: usize = 30;
    pub const MAX_PAGE_PASSES: u32 = 2;

    pub const MAX_SESSION_ATTEMPTS: u32 = 3;
    pub const BASE_BACKOFF_SECS: f64 = 2.0;
    pub const SUCCESS_THRESHOLD: usize = 10;

    pub const UPLOAD_TABLE: &str = "tiktok";
    pub const UPLOAD_CHUNK_SIZE: usize = 50;
    pub const UPLOAD_TOP_N: usize = 10;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "hashtag-scout.log";
    pub const LOG_MAX_FILES: u32 = 10;

    pub const HASHTAG_TAB_SELECTORS: &[&str] = &[
        "text=Hashtags",
        "[data-e2e='hashtag-tab']",
        "button:has-text('Hashtags')",
        "a:has-text('Hashtags')",
        "[role='tab']:has-text('Hashtag')",
    ];

    pub const VIEW_MORE_SELECTORS: &[&str] = &[
        "text=/view more/i",
        "button:has-text('View more')",
        "[data-e2e='view-more-button']",
        ".view-more-btn",
    ];

    pub const HASHTAG_ITEM_SELECTORS: &[&str] = &[
        "[data-testid*='hashtag_item']",
        "[data-e2e*='hashtag']",
        ".hashtag-item",
        "[class*='HashtagItem']",
    ];

    /// Content of the trending-songs view the page sometimes lands on
    pub const WRONG_VIEW_FINGERPRINTS: &[&str] = &["pocketful of sunshine", "trending songs"];

    pub const SONG_BLOCKLIST: &[&str] = &[
        "pocketful",
        "sunshine",
        "feeling",
        "trolls",
        "dealing",
        "bedingfield",
        "timberlake",
        "natasha",
        "justin",
        "dreamworks",
        "animation",
        "drug",
    ];

    pub const STEALTH_INIT_SCRIPT: &str = r"
        Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
        Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
        Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
        window.chrome = { runtime: {} };
        const originalQuery = window.navigator.permissions.query;
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : originalQuery(parameters)
        );
    ";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_site_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.acquisition.accept_threshold, 30);
        assert_eq!(config.interaction.failure_patience, 3);
        assert_eq!(config.session.success_threshold, 10);
        assert_eq!(config.upload.chunk_size, 50);
        assert_eq!(config.upload.top_n, Some(10));
        assert_eq!(config.selectors.view_more_button[0], "text=/view more/i");
    }

    #[test]
    fn test_region_is_substituted() {
        let mut config = ScraperConfig::default();
        config.region = "fr".into();
        let targets = config.resolved_targets();
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.ends_with("/pc/fr")));
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> = [
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_KEY", "secret"),
            ("PROXY_SERVER", "   "),
        ]
        .into_iter()
        .collect();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.upload.supabase_url.as_deref(), Some("https://example.supabase.co"));
        assert_eq!(config.upload.supabase_key.as_deref(), Some("secret"));
        assert!(config.proxy.settings().is_none());
    }

    #[tokio::test]
    async fn test_first_load_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested/config.json"));
        let config = manager.load_config().await.unwrap();
        assert!(manager.config_path().exists());
        assert_eq!(config.scraper.region, "en");
    }

    #[tokio::test]
    async fn test_partial_file_is_filled_from_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "scraper": { "region": "de", "headless": false } }"#).unwrap();

        let config = ConfigManager::with_path(&path).load_config().await.unwrap();
        assert_eq!(config.scraper.region, "de");
        assert!(!config.scraper.headless);
        assert_eq!(config.session.max_attempts, 3);
        assert_eq!(config.selectors.hashtag_item.len(), 4);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up_and_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = ConfigManager::with_path(&path).load_config().await.unwrap();
        assert_eq!(config.scraper.region, "en");
        assert!(path.with_extension("json.corrupted").exists());
    }
}
