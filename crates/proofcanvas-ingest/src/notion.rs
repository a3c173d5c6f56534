//! Notion REST client
//!
//! Implements [`DocumentStore`] over the public API:
//! - `GET /v1/pages/{id}`
//! - `GET /v1/blocks/{id}/children?page_size=100&start_cursor=...`
//!
//! No retries; any non-success status aborts the run.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::store::{BlockList, DocumentStore, Page};
use crate::IngestError;

pub const NOTION_API_KEY_ENV: &str = "NOTION_API_KEY";
pub const NOTION_BASE_URL_ENV: &str = "NOTION_BASE_URL";

const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com";
const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
const CHILDREN_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub api_key: String,
    pub base_url: String,
    pub notion_version: String,
    pub timeout_secs: u64,
}

impl NotionConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.trim().to_string(),
            base_url: DEFAULT_NOTION_BASE_URL.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            timeout_secs: 60,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Load from environment variables (`NOTION_API_KEY`, optional `NOTION_BASE_URL`).
    pub fn from_env() -> Result<Self, IngestError> {
        let api_key = std::env::var(NOTION_API_KEY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                IngestError::Config(format!("missing required env var: {NOTION_API_KEY_ENV}"))
            })?;

        let mut config = Self::new(&api_key);
        if let Some(url) = std::env::var(NOTION_BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            config = config.with_base_url(url.trim());
        }
        Ok(config)
    }
}

pub struct NotionClient {
    client: Client,
    config: NotionConfig,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<T, IngestError> {
        let url = format!("{}/v1/{}", self.config.base_url, resource);
        debug!(%url, "notion request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.notion_version)
            .send()
            .await
            .map_err(|e| IngestError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Api {
                resource: resource.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| IngestError::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl DocumentStore for NotionClient {
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, IngestError> {
        self.get_json(&format!("pages/{page_id}"), &[]).await
    }

    async fn list_children(
        &self,
        block_id: &str,
        cursor: Option<&str>,
    ) -> Result<BlockList, IngestError> {
        let mut query = vec![("page_size", CHILDREN_PAGE_SIZE.to_string())];
        if let Some(cursor) = cursor {
            query.push(("start_cursor", cursor.to_string()));
        }
        self.get_json(&format!("blocks/{block_id}/children"), &query)
            .await
    }
}
