//! Top-N selection, row shaping and chunked persistence

#![allow(clippy::uninlined_format_args)]

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::constants::site;
use crate::domain::{HashtagRecord, numeric};
use crate::infrastructure::config::UploadConfig;
use crate::infrastructure::datastore::{Datastore, RowMetadata, UploadRow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub version_id: Uuid,
    pub selected: usize,
    pub inserted: usize,
    pub failed_chunks: usize,
}

impl UploadReport {
    /// At least one row made it into the datastore
    pub fn succeeded(&self) -> bool {
        self.inserted > 0
    }
}

pub struct Uploader {
    datastore: Arc<dyn Datastore>,
    table: String,
    chunk_size: usize,
    top_n: Option<usize>,
    platform: String,
}

impl Uploader {
    pub fn new(datastore: Arc<dyn Datastore>, settings: &UploadConfig) -> Self {
        Self {
            datastore,
            table: settings.table.clone(),
            chunk_size: settings.chunk_size.max(1),
            top_n: settings.top_n,
            platform: site::PLATFORM.to_string(),
        }
    }

    /// Highest engagement first; ties keep extraction order
    pub fn select_top<'a>(records: &'a [HashtagRecord], top_n: Option<usize>) -> Vec<&'a HashtagRecord> {
        let mut ranked: Vec<&HashtagRecord> = records.iter().collect();
        ranked.sort_by(|a, b| {
            b.engagement_score
                .partial_cmp(&a.engagement_score)
                .unwrap_or(Ordering::Equal)
        });
        if let Some(n) = top_n {
            ranked.truncate(n);
        }
        ranked
    }

    pub fn build_row(
        &self,
        record: &HashtagRecord,
        source_url: &str,
        version_id: Uuid,
        scraped_at: DateTime<Utc>,
    ) -> UploadRow {
        UploadRow {
            platform: self.platform.clone(),
            topic: record.hashtag.clone(),
            engagement_score: record.engagement_score,
            sentiment_polarity: record.sentiment_polarity,
            sentiment_label: record.sentiment_label.as_str().to_string(),
            posts: numeric::normalize_opt(record.posts.as_deref()),
            views: numeric::normalize_opt(record.views.as_deref()),
            metadata: RowMetadata {
                rank: record.rank,
                category: record.category.clone(),
                source_url: source_url.to_string(),
            },
            scraped_at,
            version_id,
        }
    }

    /// Persist the selected records in chunks; a failed chunk is logged and skipped.
    ///
    /// `source_url` is the page the records were extracted from.
    pub async fn upload(&self, records: &[HashtagRecord], source_url: &str) -> UploadReport {
        let version_id = Uuid::new_v4();
        let scraped_at = Utc::now();

        let selected = Self::select_top(records, self.top_n);
        let rows: Vec<UploadRow> = selected
            .iter()
            .map(|record| self.build_row(record, source_url, version_id, scraped_at))
            .collect();

        let mut report = UploadReport {
            version_id,
            selected: rows.len(),
            inserted: 0,
            failed_chunks: 0,
        };
        if rows.is_empty() {
            warn!("⚠️  Nothing to upload");
            return report;
        }

        info!(
            "📤 Uploading {} of {} hashtags to {}:{} (version {})",
            rows.len(),
            records.len(),
            self.datastore.name(),
            self.table,
            version_id
        );

        let total_chunks = rows.len().div_ceil(self.chunk_size);
        for (index, chunk) in rows.chunks(self.chunk_size).enumerate() {
            match self.datastore.insert(&self.table, chunk).await {
                Ok(count) => {
                    report.inserted += count;
                    info!("✅ Chunk {}/{} stored {} rows", index + 1, total_chunks, count);
                }
                Err(e) => {
                    report.failed_chunks += 1;
                    error!("❌ Chunk {}/{} failed: {}", index + 1, total_chunks, e);
                }
            }
        }

        info!(
            "📦 Upload finished: {} rows stored, {} chunks failed",
            report.inserted, report.failed_chunks
        );
        report
    }
}
