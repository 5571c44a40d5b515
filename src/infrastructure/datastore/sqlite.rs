// SQLite sink for hashtag rows
// Stores rows in a local database file using sqlx

use std::path::Path;

use async_trait::async_trait;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use super::{Datastore, DatastoreError, DatastoreResult, UploadRow};

pub struct SqliteDatastore {
    pool: SqlitePool,
}

impl SqliteDatastore {
    /// Open (creating if needed) the database file at `db_path`
    pub async fn open(db_path: &Path) -> DatastoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DatastoreError::not_configured(format!("cannot create {}: {e}", parent.display())))?;
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new().max_connections(4).connect(&database_url).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the row table if it does not exist
    pub async fn ensure_table(&self, table: &str) -> DatastoreResult<()> {
        let table = sanitize_table(table)?;
        let create_sql = format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                platform TEXT NOT NULL,
                topic TEXT NOT NULL,
                engagement_score REAL NOT NULL,
                sentiment_polarity REAL NOT NULL,
                sentiment_label TEXT NOT NULL,
                posts INTEGER,
                views INTEGER,
                metadata TEXT NOT NULL,
                scraped_at DATETIME NOT NULL,
                version_id TEXT NOT NULL
            )
            "
        );
        let index_sql = format!("CREATE INDEX IF NOT EXISTS idx_{table}_version_id ON {table} (version_id)");

        sqlx::query(&create_sql).execute(&self.pool).await?;
        sqlx::query(&index_sql).execute(&self.pool).await?;
        Ok(())
    }
}

/// Table names are interpolated into SQL, so only identifiers are allowed
fn sanitize_table(table: &str) -> DatastoreResult<&str> {
    let valid = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(table)
    } else {
        Err(DatastoreError::not_configured(format!("invalid table name '{table}'")))
    }
}

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn insert(&self, table: &str, rows: &[UploadRow]) -> DatastoreResult<usize> {
        self.ensure_table(table).await?;
        let insert_sql = format!(
            "INSERT INTO {table} (platform, topic, engagement_score, sentiment_polarity, sentiment_label, \
             posts, views, metadata, scraped_at, version_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(&insert_sql)
                .bind(&row.platform)
                .bind(&row.topic)
                .bind(row.engagement_score)
                .bind(row.sentiment_polarity)
                .bind(&row.sentiment_label)
                .bind(row.posts)
                .bind(row.views)
                .bind(serde_json::to_string(&row.metadata)?)
                .bind(row.scraped_at)
                .bind(row.version_id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(rows.len())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::datastore::RowMetadata;
    use chrono::Utc;
    use sqlx::Row;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn row(topic: &str, version_id: Uuid) -> UploadRow {
        UploadRow {
            platform: "TikTok".into(),
            topic: topic.into(),
            engagement_score: 7.0,
            sentiment_polarity: 0.0,
            sentiment_label: "Neutral".into(),
            posts: Some(1500),
            views: None,
            metadata: RowMetadata {
                rank: Some(2),
                category: "Food & Cooking".into(),
                source_url: "https://example.com".into(),
            },
            scraped_at: Utc::now(),
            version_id,
        }
    }

    #[tokio::test]
    async fn test_insert_round_trip() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = SqliteDatastore::open(&dir.path().join("nested/scout.db")).await?;
        let version_id = Uuid::new_v4();

        let inserted = store
            .insert("tiktok", &[row("#cooking", version_id), row("#music", version_id)])
            .await?;
        assert_eq!(inserted, 2);

        let stored = sqlx::query("SELECT topic, metadata, version_id FROM tiktok ORDER BY id")
            .fetch_all(store.pool())
            .await?;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].get::<String, _>("topic"), "#cooking");
        let metadata: serde_json::Value = serde_json::from_str(&stored[0].get::<String, _>("metadata"))?;
        assert_eq!(metadata["rank"], 2);
        assert_eq!(stored[1].get::<String, _>("version_id"), version_id.to_string());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_unsafe_table_name() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = SqliteDatastore::open(&dir.path().join("scout.db")).await?;
        let err = store.insert("tiktok; DROP", &[]).await.err().unwrap();
        assert!(matches!(err, DatastoreError::NotConfigured(_)));
        Ok(())
    }
}
