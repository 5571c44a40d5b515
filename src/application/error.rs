//! Pipeline-level error type

use thiserror::Error;

use crate::infrastructure::browser::BrowserError;
use crate::infrastructure::datastore::DatastoreError;
use crate::infrastructure::parsing::ParsingError;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("Parsing error: {0}")]
    Parsing(#[from] ParsingError),

    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    pub fn navigation(url: &str, source: BrowserError) -> Self {
        Self::Navigation {
            url: url.to_string(),
            source,
        }
    }

    pub fn configuration(message: impl ToString) -> Self {
        Self::Configuration(message.to_string())
    }

    /// Whether a fresh browser session could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Browser(_) | Self::Navigation { .. } | Self::Io(_) => true,
            Self::Parsing(e) => e.is_recoverable(),
            Self::Datastore(_) | Self::Configuration(_) => false,
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_navigation_error_keeps_source() {
        let err = ScrapeError::navigation("https://example.com", BrowserError::timeout("navigate", Duration::from_secs(90)));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("https://example.com"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_configuration_is_not_retryable() {
        assert!(!ScrapeError::configuration("no targets").is_retryable());
        assert!(!ScrapeError::from(ParsingError::NoValidSelectors { tried: vec![] }).is_retryable());
    }
}
