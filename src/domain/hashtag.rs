//! Hashtag records and run bookkeeping

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sentiment::SentimentLabel;

/// One ranked hashtag as extracted from the ranking page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashtagRecord {
    /// Leading rank; `None` when the row carried no usable rank
    pub rank: Option<u32>,
    /// `#` followed by the lowercase alphabetic body
    pub hashtag: String,
    /// Raw magnitude string such as "12K"
    pub posts: Option<String>,
    /// Not rendered by the current layout
    pub views: Option<String>,
    pub category: String,
    pub engagement_score: f64,
    pub sentiment_polarity: f64,
    pub sentiment_label: SentimentLabel,
}

impl HashtagRecord {
    pub fn rank_display(&self) -> String {
        self.rank.map_or_else(|| "N/A".to_string(), |r| r.to_string())
    }
}

/// Run-scoped set of hashtags already emitted
#[derive(Debug, Clone, Default)]
pub struct SeenHashtags(HashSet<String>);

impl SeenHashtags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dedup key for a hashtag
    pub fn normalize(hashtag: &str) -> String {
        hashtag.trim().to_lowercase()
    }

    /// Record a hashtag; returns `false` if it was already present
    pub fn insert(&mut self, hashtag: &str) -> bool {
        self.0.insert(Self::normalize(hashtag))
    }

    pub fn contains(&self, hashtag: &str) -> bool {
        self.0.contains(&Self::normalize(hashtag))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// Run-level metadata, logged at start and finalized at the end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub platform: String,
    pub region: String,
    pub headless: bool,
    pub debug_capture: bool,
    pub upload_enabled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub status: RunStatus,
    pub total_hashtags: usize,
    pub attempts_used: u32,
    pub uploaded: usize,
    pub error: Option<String>,
}

impl RunMetadata {
    pub fn start(platform: &str, region: &str, headless: bool, debug_capture: bool, upload_enabled: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            platform: platform.to_string(),
            region: region.to_string(),
            headless,
            debug_capture,
            upload_enabled,
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: None,
            status: RunStatus::Running,
            total_hashtags: 0,
            attempts_used: 0,
            uploaded: 0,
            error: None,
        }
    }

    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        let now = Utc::now();
        let elapsed = (now - self.started_at).to_std().unwrap_or(Duration::ZERO);
        self.finished_at = Some(now);
        self.duration_secs = Some(elapsed.as_secs_f64());
        self.status = status;
        self.error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_set_normalizes_case() {
        let mut seen = SeenHashtags::new();
        assert!(seen.insert("#Music"));
        assert!(!seen.insert("#music"));
        assert!(!seen.insert(" #MUSIC "));
        assert!(seen.contains("#music"));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_run_metadata_lifecycle() {
        let mut meta = RunMetadata::start("TikTok", "en", true, false, true);
        assert_eq!(meta.status, RunStatus::Running);
        assert!(meta.finished_at.is_none());

        meta.finish(RunStatus::Failed, Some("boom".into()));
        assert_eq!(meta.status, RunStatus::Failed);
        assert!(meta.finished_at.is_some());
        assert!(meta.duration_secs.unwrap() >= 0.0);
        assert_eq!(meta.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_rank_display() {
        let mut record = HashtagRecord {
            rank: Some(3),
            hashtag: "#music".into(),
            posts: None,
            views: None,
            category: "Music".into(),
            engagement_score: 5.0,
            sentiment_polarity: 0.0,
            sentiment_label: SentimentLabel::Neutral,
        };
        assert_eq!(record.rank_display(), "3");
        record.rank = None;
        assert_eq!(record.rank_display(), "N/A");
    }
}
