//! Spreadsheet REST client — `values:batchGet` and `values:batchUpdate`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use herald_core::config::TrackerConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::traits::SheetStore;
use herald_core::types::{Grid, RangeUpdate};

use crate::auth::{SHEETS_SCOPE, ServiceAccountKey, TokenProvider};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    values: Grid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateBody<'a> {
    value_input_option: &'a str,
    data: &'a [RangeUpdate],
}

/// REST client for one tracker spreadsheet.
pub struct SheetsClient {
    sheet_id: String,
    base_url: String,
    http: reqwest::Client,
    auth: TokenProvider,
}

impl SheetsClient {
    pub fn new(sheet_id: &str, key: ServiceAccountKey) -> Self {
        Self {
            sheet_id: sheet_id.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
            auth: TokenProvider::new(key, SHEETS_SCOPE),
        }
    }

    /// Build a client from tracker configuration (loads the key file).
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        if config.sheet_id.is_empty() {
            return Err(HeraldError::Config("tracker.sheet_id is not set".into()));
        }
        let key = ServiceAccountKey::from_file(std::path::Path::new(&config.credentials_path))?;
        Ok(Self::new(&config.sheet_id, key))
    }

    /// Probe the store: fetch the spreadsheet title. Used by `herald check`.
    pub async fn probe(&self) -> Result<String> {
        let url = format!("{}/{}", self.base_url, self.sheet_id);
        let response = self
            .send_authorized(|token| {
                self.http
                    .get(&url)
                    .query(&[("fields", "properties.title")])
                    .bearer_auth(token)
                    .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            })
            .await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HeraldError::Sheets(format!("Probe response: {e}")))?;
        Ok(body["properties"]["title"]
            .as_str()
            .unwrap_or("(untitled)")
            .to_string())
    }

    /// Send a request with a bearer token; on 401, invalidate the cached
    /// token and retry once with a fresh one.
    async fn send_authorized(
        &self,
        build: impl Fn(String) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let token = self.auth.token().await?;
        let response = build(token)
            .send()
            .await
            .map_err(|e| HeraldError::Sheets(format!("Request failed: {e}")))?;

        let response = if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
            let token = self.auth.token().await?;
            build(token)
                .send()
                .await
                .map_err(|e| HeraldError::Sheets(format!("Request failed after re-auth: {e}")))?
        } else {
            response
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HeraldError::Sheets(format!("API error {status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl SheetStore for SheetsClient {
    async fn fetch_ranges(&self, identity_range: &str, state_range: &str) -> Result<(Grid, Grid)> {
        let url = format!("{}/{}/values:batchGet", self.base_url, self.sheet_id);
        let response = self
            .send_authorized(|token| {
                self.http
                    .get(&url)
                    .query(&[
                        ("ranges", identity_range),
                        ("ranges", state_range),
                        ("majorDimension", "ROWS"),
                    ])
                    .bearer_auth(token)
                    .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            })
            .await?;

        let body: BatchGetResponse = response
            .json()
            .await
            .map_err(|e| HeraldError::Sheets(format!("batchGet response: {e}")))?;

        let mut ranges = body.value_ranges.into_iter();
        let (Some(identity), Some(state)) = (ranges.next(), ranges.next()) else {
            return Err(HeraldError::Sheets(
                "Unexpected batchGet response structure".into(),
            ));
        };
        tracing::debug!(
            "📥 Fetched {} identity row(s), {} state row(s)",
            identity.values.len(),
            state.values.len()
        );
        Ok((identity.values, state.values))
    }

    async fn batch_update(&self, updates: Vec<RangeUpdate>) -> Result<()> {
        let url = format!("{}/{}/values:batchUpdate", self.base_url, self.sheet_id);
        let body = BatchUpdateBody {
            value_input_option: "RAW",
            data: &updates,
        };
        self.send_authorized(|token| {
            self.http
                .post(&url)
                .json(&body)
                .bearer_auth(token)
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        })
        .await?;
        Ok(())
    }
}
