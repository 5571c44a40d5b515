//! Re-export of the parsing error types

pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
