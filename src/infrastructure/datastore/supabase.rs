//! Supabase (PostgREST) sink over `reqwest`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::debug;
use url::Url;

use super::{Datastore, DatastoreError, DatastoreResult, UploadRow};

pub struct SupabaseDatastore {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl SupabaseDatastore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> DatastoreResult<Self> {
        if api_key.trim().is_empty() {
            return Err(DatastoreError::not_configured("SUPABASE_KEY is empty"));
        }
        let base_url = Url::parse(base_url)
            .map_err(|e| DatastoreError::not_configured(format!("invalid SUPABASE_URL '{base_url}': {e}")))?;

        let client = ClientBuilder::new().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Build from optional config values; both must be present
    pub fn from_settings(url: Option<&str>, key: Option<&str>, timeout: Duration) -> DatastoreResult<Self> {
        match (url, key) {
            (Some(url), Some(key)) => Self::new(url, key, timeout),
            _ => Err(DatastoreError::not_configured(
                "SUPABASE_URL and SUPABASE_KEY must both be set",
            )),
        }
    }

    /// `<base>/rest/v1/<table>`
    pub fn table_url(&self, table: &str) -> DatastoreResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/rest/v1/{table}"))
            .map_err(|e| DatastoreError::not_configured(format!("invalid table endpoint: {e}")))
    }
}

#[async_trait]
impl Datastore for SupabaseDatastore {
    async fn insert(&self, table: &str, rows: &[UploadRow]) -> DatastoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let endpoint = self.table_url(table)?;
        debug!("POST {} rows to {}", rows.len(), endpoint);

        let response = self
            .client
            .post(endpoint)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DatastoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // With return=representation the inserted rows are echoed back
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(serde_json::Value::Array(inserted)) => Ok(inserted.len()),
            Ok(_) => Ok(rows.len()),
            Err(_) if body.trim().is_empty() => Ok(rows.len()),
            Err(e) => Err(DatastoreError::Serialization(e)),
        }
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}
