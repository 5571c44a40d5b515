//! Infrastructure layer: browser automation, HTML parsing, persistence,
//! configuration, logging and timing primitives.

pub mod backoff;
pub mod browser;
pub mod config;
pub mod datastore;
pub mod logging;
pub mod pacing;
pub mod parsing;
pub mod parsing_error;

pub use backoff::{BackoffCalculator, BackoffPolicy};
pub use browser::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, BrowserSurface, ChromiumLauncher, SessionOptions,
    SurfaceElement, WaitPolicy,
};
pub use config::{AppConfig, ConfigManager};
pub use datastore::{Datastore, DatastoreError, SqliteDatastore, SupabaseDatastore, UploadRow};
pub use logging::{get_log_directory, init_logging_with_config};
pub use pacing::{JitterWindow, Pacer, TokioPacer};
pub use parsing::{HtmlDocument, ParsingError, ParsingResult, SelectorChain};
