//! Typed client for the Google Sheets values API.

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::SheetsError;
use crate::auth::{AccessToken, ServiceAccountKey, fetch_token};

/// Production Sheets API endpoint.
pub const API_BASE: &str = "https://sheets.googleapis.com";

/// Client for the spreadsheet holding the posting queue.
///
/// Authentication is the JWT-bearer grant: a signed assertion is exchanged
/// for a bearer token, which is cached and refreshed near expiry.
pub struct SheetsClient {
    http: Client,
    api_base: String,
    token_url: Option<String>,
    key: ServiceAccountKey,
    token: RwLock<Option<AccessToken>>,
}

impl SheetsClient {
    /// Create a client against the production API.
    pub fn new(key: ServiceAccountKey) -> Self {
        Self::with_api_base(key, API_BASE)
    }

    /// Create a client against a custom API endpoint.
    pub fn with_api_base(key: ServiceAccountKey, api_base: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            api_base: api_base.into(),
            token_url: None,
            key,
            token: RwLock::new(None),
        }
    }

    /// Exchange tokens at `url` instead of the key's `token_uri`.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Current bearer token, fetched or refreshed as needed.
    async fn access_token(&self) -> Result<String, SheetsError> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref()
                && token.is_fresh()
            {
                return Ok(token.value.clone());
            }
        }

        let url = self
            .token_url
            .clone()
            .unwrap_or_else(|| self.key.token_uri.clone());
        let fresh = fetch_token(&self.http, &self.key, &url).await?;
        let value = fresh.value.clone();
        *self.token.write().await = Some(fresh);
        Ok(value)
    }

    /// Read all values of `range` (A1 notation). Trailing empty rows and
    /// cells are absent from the response, not empty strings.
    pub async fn values_get(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base,
            spreadsheet_id,
            encode_range(range)
        );

        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let range: ValueRange = Self::handle_response(response).await?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    /// Overwrite `range` with `values` (RAW input, no formula parsing).
    pub async fn values_update(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<(), SheetsError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base,
            spreadsheet_id,
            encode_range(range)
        );

        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "values": values }))
            .send()
            .await?;

        let _: Value = Self::handle_response(response).await?;
        Ok(())
    }

    /// Title of the spreadsheet's first worksheet.
    pub async fn first_sheet_title(&self, spreadsheet_id: &str) -> Result<String, SheetsError> {
        let token = self.access_token().await?;
        let url = format!("{}/v4/spreadsheets/{}", self.api_base, spreadsheet_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("fields", "sheets.properties")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = Self::handle_response(response).await?;

        meta.sheets
            .into_iter()
            .next()
            .map(|sheet| sheet.properties.title)
            .ok_or_else(|| SheetsError::WorksheetNotFound("first sheet".to_string()))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SheetsError> {
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

/// Extract a spreadsheet id from a bare id or a full sheets URL.
pub fn spreadsheet_id_from_ref(sheet_ref: &str) -> Result<String, SheetsError> {
    let sheet_ref = sheet_ref.trim();
    if sheet_ref.is_empty() {
        return Err(SheetsError::InvalidSheetRef(sheet_ref.to_string()));
    }

    if let Some((_, rest)) = sheet_ref.split_once("/spreadsheets/d/") {
        let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if id.is_empty() {
            return Err(SheetsError::InvalidSheetRef(sheet_ref.to_string()));
        }
        return Ok(id.to_string());
    }

    if sheet_ref.contains('/') {
        return Err(SheetsError::InvalidSheetRef(sheet_ref.to_string()));
    }
    Ok(sheet_ref.to_string())
}

fn encode_range(range: &str) -> String {
    utf8_percent_encode(range, NON_ALPHANUMERIC).to_string()
}

/// Formatted cell values arrive as strings, but untyped cells can surface
/// as numbers or booleans.
fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}
