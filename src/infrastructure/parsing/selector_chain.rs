//! Ordered CSS selector fallback chains

use scraper::Selector;
use tracing::{debug, warn};

use super::{ParsingError, ParsingResult};

/// Compiled selectors tried in order; the first one with any match wins
#[derive(Debug, Clone)]
pub struct SelectorChain {
    entries: Vec<(String, Selector)>,
}

impl SelectorChain {
    /// Compile selector strings, skipping the ones `scraper` rejects.
    ///
    /// Fails only when nothing in the list compiles.
    pub fn compile<S: AsRef<str>>(selector_strings: &[S]) -> ParsingResult<Self> {
        let mut entries = Vec::new();
        let mut errors = Vec::new();

        for raw in selector_strings {
            let raw = raw.as_ref();
            match Selector::parse(raw) {
                Ok(selector) => entries.push((raw.to_string(), selector)),
                Err(e) => {
                    warn!("Failed to compile selector '{}': {}", raw, e);
                    errors.push(raw.to_string());
                }
            }
        }

        if entries.is_empty() {
            return Err(ParsingError::NoValidSelectors { tried: errors });
        }
        if !errors.is_empty() {
            debug!("Some selectors failed to compile: {}", errors.join(", "));
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &Selector)> {
        self.entries.iter().map(|(raw, sel)| (raw.as_str(), sel))
    }
}
