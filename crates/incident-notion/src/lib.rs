//! Notion database client that feeds the incident timeline.

use std::time::Duration;

use async_trait::async_trait;
use incident_core::{normalize_page, FetchFailure, Incident, IncidentSource, PROP_DATE};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings. Credentials are optional so that a misconfigured
/// deployment still starts and reports the problem as a fetch failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub database_id: Option<String>,
    pub base_url: String,
    pub notion_version: String,
    pub timeout_secs: u64,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            database_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Serialize)]
struct QuerySort<'a> {
    property: &'a str,
    direction: &'a str,
}

#[derive(Debug, Serialize)]
struct DatabaseQuery<'a> {
    sorts: [QuerySort<'a>; 1],
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    message: Option<String>,
}

/// Queries one Notion database, newest incidents first.
pub struct NotionClient {
    client: Client,
    config: NotionConfig,
}

impl NotionClient {
    #[must_use]
    pub fn new(config: NotionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn credentials(&self) -> Result<(&str, &str), FetchFailure> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| FetchFailure::MissingCredentials("NOTION_API_KEY is not set".into()))?;
        let database_id =
            self.config.database_id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
                FetchFailure::MissingCredentials("NOTION_DATABASE_ID is not set".into())
            })?;
        Ok((api_key, database_id))
    }

    /// Run the database query and normalize every returned page, keeping the
    /// order Notion returned them in.
    ///
    /// # Errors
    /// Returns [`FetchFailure`] when credentials are missing, the request
    /// fails, Notion answers with a non-success status, or the body is not a
    /// query result.
    pub async fn query_incidents(&self) -> Result<Vec<Incident>, FetchFailure> {
        let (api_key, database_id) = self.credentials()?;
        let url = format!(
            "{}/databases/{}/query",
            self.config.base_url.trim_end_matches('/'),
            database_id
        );
        let body =
            DatabaseQuery { sorts: [QuerySort { property: PROP_DATE, direction: "descending" }] };

        tracing::debug!(database_id, "querying notion database");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("Notion-Version", &self.config.notion_version)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| FetchFailure::Network(err.to_string()))?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|err| FetchFailure::Network(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<NotionErrorBody>(&bytes)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("unexpected status").to_string()
                });
            return Err(FetchFailure::Remote { status: status.as_u16(), message });
        }

        let parsed: QueryResponse = serde_json::from_slice(&bytes)
            .map_err(|err| FetchFailure::Malformed(err.to_string()))?;
        let incidents: Vec<Incident> = parsed.results.iter().map(normalize_page).collect();
        tracing::info!(count = incidents.len(), "fetched incidents from notion");
        Ok(incidents)
    }
}

#[async_trait]
impl IncidentSource for NotionClient {
    async fn fetch_incidents(&self) -> Result<Vec<Incident>, FetchFailure> {
        self.query_incidents().await
    }
}
