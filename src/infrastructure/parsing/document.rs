//! Parsed HTML document with fallback-chain selection

use scraper::{ElementRef, Html};
use tracing::debug;

use super::SelectorChain;

pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// Elements matched by the first selector in `chain` that matches anything.
    ///
    /// This is a fallback chain, not a union of all selectors.
    pub fn select_first(&self, chain: &SelectorChain) -> Vec<ElementRef<'_>> {
        for (raw, selector) in chain.entries() {
            let found: Vec<ElementRef<'_>> = self.html.select(selector).collect();
            if !found.is_empty() {
                debug!("Selector '{}' matched {} elements", raw, found.len());
                return found;
            }
        }
        Vec::new()
    }

    /// Number of elements the chain would yield
    pub fn count(&self, chain: &SelectorChain) -> usize {
        self.select_first(chain).len()
    }

    /// Visible text of an element: text nodes trimmed and concatenated
    pub fn flattened_text(element: &ElementRef<'_>) -> String {
        element
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<String>()
    }
}
