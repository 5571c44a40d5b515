//! Persistence sinks for scraped hashtag rows
//!
//! [`SupabaseDatastore`] posts rows to a PostgREST endpoint; [`SqliteDatastore`]
//! writes them into a local database file.

pub mod sqlite;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use sqlite::SqliteDatastore;
pub use supabase::SupabaseDatastore;

#[derive(Error, Debug)]
pub enum DatastoreError {
    #[error("Datastore not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Datastore rejected insert (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatastoreError {
    pub fn not_configured(what: impl ToString) -> Self {
        Self::NotConfigured(what.to_string())
    }
}

pub type DatastoreResult<T> = Result<T, DatastoreError>;

/// Extra per-row context stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMetadata {
    pub rank: Option<u32>,
    pub category: String,
    pub source_url: String,
}

/// One persisted hashtag row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRow {
    pub platform: String,
    pub topic: String,
    pub engagement_score: f64,
    pub sentiment_polarity: f64,
    pub sentiment_label: String,
    pub posts: Option<i64>,
    pub views: Option<i64>,
    pub metadata: RowMetadata,
    pub scraped_at: DateTime<Utc>,
    pub version_id: Uuid,
}

#[async_trait]
pub trait Datastore: Send + Sync {
    /// Insert `rows` into `table`; returns the number of rows stored
    async fn insert(&self, table: &str, rows: &[UploadRow]) -> DatastoreResult<usize>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_serializes_with_nested_metadata() {
        let row = UploadRow {
            platform: "TikTok".into(),
            topic: "#music".into(),
            engagement_score: 8.9,
            sentiment_polarity: 0.0,
            sentiment_label: "Neutral".into(),
            posts: Some(2_000_000),
            views: None,
            metadata: RowMetadata {
                rank: None,
                category: "Music".into(),
                source_url: "https://ads.tiktok.com".into(),
            },
            scraped_at: Utc::now(),
            version_id: Uuid::new_v4(),
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["topic"], "#music");
        assert_eq!(value["posts"], 2_000_000);
        assert!(value["views"].is_null());
        assert!(value["metadata"]["rank"].is_null());
        assert_eq!(value["metadata"]["category"], "Music");
        assert!(value["scraped_at"].as_str().unwrap().ends_with('Z'));
    }
}
