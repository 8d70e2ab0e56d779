//! Google Sheets client
//!
//! Authenticates with a service account: a short-lived RS256 assertion is
//! exchanged at the key's token URI for a bearer token, which is cached
//! until shortly before it expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::SheetsConfig;
use crate::error::{AppError, ExternalError};

const SERVICE: &str = "google_sheets";
const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account JSON key this client needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("cannot read service account key {}: {}", path, e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::Configuration(format!("invalid service account key {}: {}", path, e))
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// A rectangular range in zero-based, end-exclusive grid coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    #[serde(default)]
    pub sheet_id: i64,
    #[serde(default)]
    pub start_row_index: i64,
    #[serde(default)]
    pub end_row_index: i64,
    #[serde(default)]
    pub start_column_index: i64,
    #[serde(default)]
    pub end_column_index: i64,
}

impl GridRange {
    pub fn overlaps_rows(&self, start: i64, end: i64) -> bool {
        self.start_row_index < end && start < self.end_row_index
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
    #[serde(default)]
    merges: Vec<GridRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    #[serde(default)]
    title: String,
}

/// Spreadsheet column letters for a zero-based index (0 → A, 26 → AA)
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 notation for a block starting at a zero-based column and one-based row
pub fn a1_range(sheet: &str, start_col: usize, start_row: usize, cols: usize, rows: usize) -> String {
    let end_col = start_col + cols.max(1) - 1;
    let end_row = start_row + rows.max(1) - 1;
    format!(
        "'{}'!{}{}:{}{}",
        sheet.replace('\'', "''"),
        column_letter(start_col),
        start_row,
        column_letter(end_col),
        end_row
    )
}

/// Google Sheets API client bound to one spreadsheet tab
#[derive(Clone)]
pub struct SheetsClient {
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    sheet_id: i64,
    key: ServiceAccountKey,
    token: Arc<Mutex<Option<CachedToken>>>,
    http_client: Client,
}

impl SheetsClient {
    pub fn new(key: ServiceAccountKey, config: &SheetsConfig) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            sheet_id: config.sheet_id,
            key,
            token: Arc::new(Mutex::new(None)),
            http_client: Client::new(),
        }
    }

    /// Load the service-account key named in the configuration
    pub fn from_config(config: &SheetsConfig) -> Result<Self, AppError> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(AppError::Configuration(
                "sheets.spreadsheet_id is not set".to_string(),
            ));
        }
        let key = ServiceAccountKey::from_file(&config.credentials_path)?;
        Ok(Self::new(key, config))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn sheet_id(&self) -> i64 {
        self.sheet_id
    }

    fn assertion(&self) -> Result<String, ExternalError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| ExternalError::invalid(SERVICE, 0, format!("bad private key: {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| ExternalError::invalid(SERVICE, 0, format!("cannot sign assertion: {}", e)))
    }

    /// Bearer token, refreshed when missing or about to expire
    async fn access_token(&self) -> Result<String, ExternalError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(token.token.clone());
            }
        }

        let assertion = self.assertion()?;
        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalError::invalid(SERVICE, status.as_u16(), body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ExternalError::invalid(SERVICE, status.as_u16(), e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        tracing::debug!("Obtained Google access token");
        Ok(token.access_token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ExternalError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), body = %body, "Sheets API error");
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ExternalError::NotFound {
                service: SERVICE,
                what: "spreadsheet or range".to_string(),
            });
        }
        Err(ExternalError::invalid(SERVICE, status.as_u16(), body))
    }

    /// Read a range in A1 notation; cells come back as display strings
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, ExternalError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;
        let response = Self::check(response).await?;

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| ExternalError::invalid(SERVICE, 200, e.to_string()))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect())
    }

    /// Overwrite a range with rows of values (`USER_ENTERED`)
    pub async fn update_values(
        &self,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), ExternalError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        );

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&serde_json::json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": rows,
            }))
            .send()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;
        Self::check(response).await?;
        Ok(())
    }

    /// Merged ranges on the configured sheet
    pub async fn find_merged_ranges(&self) -> Result<Vec<GridRange>, ExternalError> {
        let token = self.access_token().await?;
        let url = format!("{}/spreadsheets/{}", self.base_url, self.spreadsheet_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", "sheets(properties(sheetId,title),merges)")])
            .send()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;
        let response = Self::check(response).await?;

        let meta: SpreadsheetMeta = response
            .json()
            .await
            .map_err(|e| ExternalError::invalid(SERVICE, 200, e.to_string()))?;

        let sheet = meta
            .sheets
            .into_iter()
            .find(|s| s.properties.sheet_id == self.sheet_id || s.properties.title == self.sheet_name)
            .ok_or_else(|| ExternalError::NotFound {
                service: SERVICE,
                what: format!("sheet {}", self.sheet_name),
            })?;

        Ok(sheet.merges)
    }

    async fn batch_update(&self, requests: Vec<serde_json::Value>) -> Result<(), ExternalError> {
        if requests.is_empty() {
            return Ok(());
        }
        let token = self.access_token().await?;
        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.base_url, self.spreadsheet_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;
        Self::check(response).await?;
        Ok(())
    }

    /// Merge each range into a single cell
    pub async fn merge_cells(&self, ranges: &[GridRange]) -> Result<(), ExternalError> {
        let requests = ranges
            .iter()
            .map(|r| serde_json::json!({ "mergeCells": { "range": r, "mergeType": "MERGE_ALL" } }))
            .collect();
        self.batch_update(requests).await
    }

    pub async fn unmerge_cells(&self, ranges: &[GridRange]) -> Result<(), ExternalError> {
        let requests = ranges
            .iter()
            .map(|r| serde_json::json!({ "unmergeCells": { "range": r } }))
            .collect();
        self.batch_update(requests).await
    }
}
