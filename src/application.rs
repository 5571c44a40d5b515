//! Application layer: the scraping pipeline from browser session to upload
//!
//! Control flow: [`ScrapeRun`] → [`SessionOrchestrator`] → [`SessionRunner`]
//! → [`PageAcquisitionPipeline`] → [`InteractionRetryController`] →
//! [`RecordExtractor`] → [`Uploader`].

pub mod acquisition;
pub mod error;
pub mod extractor;
pub mod interaction;
pub mod run;
pub mod session;
pub mod uploader;

pub use acquisition::{AcquiredPage, PageAcquisitionPipeline};
pub use error::{ScrapeError, ScrapeResult};
pub use extractor::RecordExtractor;
pub use interaction::{ActivationReport, InteractionRetryController, StopReason};
pub use run::{RunReport, ScrapeRun};
pub use session::{AttemptPlan, BrowserSessionRunner, SessionOrchestrator, SessionOutcome, SessionRunner};
pub use uploader::{UploadReport, Uploader};
