//! Hashtag Scout - trending hashtag scraper
//!
//! Drives a real browser to a hashtag ranking page, expands the list,
//! extracts ranked hashtag records from the rendered markup, scores them and
//! uploads the best ones to a datastore.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use application::{RunReport, ScrapeError, ScrapeRun};
pub use domain::{HashtagRecord, RunMetadata, RunStatus};
pub use infrastructure::config::{AppConfig, ConfigManager};
