//! PostgREST record store
//!
//! Writes records to a table exposed through PostgREST, such as a Supabase
//! project, using its merge-duplicates upsert.

use crate::record::Record;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Longest response body kept in a status error
const MAX_ERROR_BODY: usize = 512;

/// PostgREST storage backend
pub struct PostgrestStore {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl PostgrestStore {
    /// Creates a store writing to `{base_url}/rest/v1/{table}`
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL, e.g. `https://abc.supabase.co`
    /// * `table` - Destination table
    /// * `api_key` - Service key sent as `apikey` and bearer token
    pub fn new(base_url: &str, table: &str, api_key: impl Into<String>) -> StorageResult<Self> {
        let mut endpoint = Url::parse(base_url)
            .map_err(|e| StorageError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let prefix = endpoint.path().trim_end_matches('/').to_string();
        endpoint.set_path(&format!("{}/rest/v1/{}", prefix, table));
        endpoint.set_query(Some("on_conflict=id"));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn upsert(&self, record: &Record) -> StorageResult<()> {
        let body = serde_json::to_vec(&[record])?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", self.api_key.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        tracing::trace!("Upserted record {} to {}", record.id, self.endpoint);
        Ok(())
    }

    fn describe(&self) -> String {
        let mut endpoint = self.endpoint.clone();
        endpoint.set_query(None);
        endpoint.to_string()
    }
}
