//! HTML parsing infrastructure
//!
//! Wraps `scraper` behind a small document type with ordered selector
//! fallback chains. Documents are `!Send`, so parse, select and read text
//! inside synchronous code and only carry owned strings across awaits.

pub mod document;
pub mod error;
pub mod selector_chain;

pub use document::HtmlDocument;
pub use error::{ParsingError, ParsingResult};
pub use selector_chain::SelectorChain;
