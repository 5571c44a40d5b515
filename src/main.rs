//! hashtag-scout command line entry point

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hashtag_scout::infrastructure::logging;
use hashtag_scout::{AppConfig, ConfigManager, ScrapeRun};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "hashtag-scout")]
#[command(about = "Scrape trending hashtags from the ranking page and upload the best ones")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Skip writing the final page source to disk
    #[arg(long)]
    no_debug: bool,

    /// Skip uploading results
    #[arg(long)]
    no_upload: bool,

    /// Region code for the ranking page
    #[arg(short, long)]
    region: Option<String>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,

    /// Store rows in a local SQLite file instead of the remote datastore
    #[arg(long)]
    sqlite: Option<PathBuf>,
}

impl Cli {
    /// Command line flags take precedence over file and environment
    fn apply(&self, config: &mut AppConfig) {
        if self.headed {
            config.scraper.headless = false;
        }
        if self.no_debug {
            config.scraper.debug_capture = false;
        }
        if self.no_upload {
            config.scraper.upload_enabled = false;
        }
        if let Some(region) = &self.region {
            config.scraper.region = region.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(path) = &self.sqlite {
            config.upload.sqlite_path = Some(path.clone());
        }
    }
}

async fn load_config(cli: &Cli) -> Result<AppConfig> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config().await?;
    config.apply_env_overrides();
    cli.apply(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).await?;

    logging::init_logging_with_config(&config.logging).context("Failed to initialize logging")?;
    logging::log_system_info();

    let run = ScrapeRun::from_config(config).await?;
    let report = tokio::select! {
        report = run.execute() => report?,
        _ = tokio::signal::ctrl_c() => {
            warn!("🛑 Interrupted, shutting down");
            bail!("interrupted");
        }
    };

    info!("Done: {} hashtags, {} uploaded", report.records.len(), report.metadata.uploaded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "hashtag-scout",
            "--headed",
            "--no-debug",
            "--no-upload",
            "--region",
            "de",
            "--log-level",
            "debug",
            "--sqlite",
            "out/scout.db",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert!(!config.scraper.headless);
        assert!(!config.scraper.debug_capture);
        assert!(!config.scraper.upload_enabled);
        assert_eq!(config.scraper.region, "de");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.upload.sqlite_path, Some(PathBuf::from("out/scout.db")));
    }

    #[test]
    fn test_no_flags_keep_defaults() {
        let cli = Cli::parse_from(["hashtag-scout"]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert!(config.scraper.headless);
        assert!(config.scraper.upload_enabled);
        assert_eq!(config.scraper.region, "en");
    }
}
