//! Parsing error types for HTML and pattern handling

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No valid selectors compiled from: {}", tried.join(", "))]
    NoValidSelectors { tried: Vec<String> },

    #[error("Invalid extraction pattern: {pattern} - {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Field '{field}' not found in element text")]
    FieldMissing { field: String },
}

impl ParsingError {
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_pattern(pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn field_missing(field: &str) -> Self {
        Self::FieldMissing {
            field: field.to_string(),
        }
    }

    /// Per-element failures are recoverable; configuration failures are not
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::FieldMissing { .. } | Self::InvalidSelector { .. } => true,
            Self::NoValidSelectors { .. } | Self::InvalidPattern { .. } => false,
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
