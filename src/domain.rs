//! Domain module - hashtag records, scoring and classification
//!
//! Pure logic with no browser or network access:
//! - Magnitude normalization ("1.5K" → 1500)
//! - Engagement scoring policies
//! - Category table and sentiment analyzers
//! - Record, dedup set and run metadata types

pub mod category;
pub mod constants;
pub mod engagement;
pub mod hashtag;
pub mod numeric;
pub mod sentiment;

pub use category::{CategoryRule, CategoryTable};
pub use engagement::{EngagementScorer, ScoringPolicy};
pub use hashtag::{HashtagRecord, RunMetadata, RunStatus, SeenHashtags};
pub use sentiment::{
    LexiconSentiment, NeutralSentiment, Sentiment, SentimentAnalyzer, SentimentLabel, SentimentMode,
};
