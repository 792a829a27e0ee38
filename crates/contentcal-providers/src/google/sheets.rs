//! Google Sheets and Drive API client.
//!
//! A thin typed layer over the four calls the provisioner needs. Failures
//! are mapped to [`ProviderError`] codes here, so the retry executor can
//! classify them without looking at HTTP details.

use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::BoxFuture;
use crate::error::{ProviderError, ProviderResult};

use super::config::GoogleConfig;

/// Who gets access when a spreadsheet is shared by link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    Reader,
    Writer,
}

impl ShareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
        }
    }
}

impl fmt::Display for ShareRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShareRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reader" => Ok(Self::Reader),
            "writer" => Ok(Self::Writer),
            other => Err(format!("unknown share role {other:?} (expected reader or writer)")),
        }
    }
}

/// A sheet to create along with the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSheet {
    pub sheet_id: i64,
    pub title: String,
    pub rows: u32,
    pub columns: u32,
}

/// What the API returned for a new spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSpreadsheet {
    pub spreadsheet_id: String,
    pub url: String,
    /// `(sheet_id, title)` of every sheet, in order.
    pub sheets: Vec<(i64, String)>,
}

impl CreatedSpreadsheet {
    /// Looks up a sheet id by title.
    pub fn sheet_id(&self, title: &str) -> Option<i64> {
        self.sheets
            .iter()
            .find(|(_, t)| t == title)
            .map(|(id, _)| *id)
    }
}

/// The remote calls used to provision a calendar.
pub trait SheetsApi: Send + Sync {
    /// Creates a spreadsheet with the given sheets. Not idempotent.
    fn create_spreadsheet<'a>(
        &'a self,
        title: &'a str,
        sheets: &'a [NewSheet],
    ) -> BoxFuture<'a, ProviderResult<CreatedSpreadsheet>>;

    /// Overwrites the cells of an A1 `range`.
    fn update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        rows: &'a [Vec<String>],
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Applies a list of `batchUpdate` requests.
    fn batch_update<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        requests: &'a [serde_json::Value],
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Grants anyone with the link the given role. Not idempotent.
    fn share<'a>(&'a self, spreadsheet_id: &'a str, role: ShareRole)
    -> BoxFuture<'a, ProviderResult<()>>;

    /// Replaces the bearer token used by later calls.
    fn set_access_token(&self, access_token: String);
}

/// Sheets v4 / Drive v3 client authenticated with a bearer token.
pub struct SheetsClient {
    http_client: reqwest::Client,
    sheets_base_url: String,
    drive_base_url: String,
    access_token: RwLock<String>,
}

impl fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsClient")
            .field("sheets_base_url", &self.sheets_base_url)
            .field("drive_base_url", &self.drive_base_url)
            .finish_non_exhaustive()
    }
}

impl SheetsClient {
    pub fn new(config: &GoogleConfig, access_token: impl Into<String>) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            http_client,
            sheets_base_url: config.sheets_base_url.trim_end_matches('/').to_string(),
            drive_base_url: config.drive_base_url.trim_end_matches('/').to_string(),
            access_token: RwLock::new(access_token.into()),
        })
    }

    async fn create(&self, title: &str, sheets: &[NewSheet]) -> ProviderResult<CreatedSpreadsheet> {
        let body = CreateRequest {
            properties: TitleProperties { title },
            sheets: sheets
                .iter()
                .map(|s| SheetSpec {
                    properties: SheetProperties {
                        sheet_id: s.sheet_id,
                        title: &s.title,
                        grid_properties: GridProperties {
                            row_count: s.rows,
                            column_count: s.columns,
                        },
                    },
                })
                .collect(),
        };

        let url = format!("{}/spreadsheets", self.sheets_base_url);
        let text = self.send(self.http_client.post(&url).json(&body)).await?;

        let created: CreateResponse = serde_json::from_str(&text).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse create response: {e}"))
        })?;
        if created.spreadsheet_id.is_empty() {
            return Err(ProviderError::invalid_response("create response has no spreadsheetId"));
        }

        let url = created.spreadsheet_url.unwrap_or_else(|| {
            format!(
                "https://docs.google.com/spreadsheets/d/{}/edit",
                created.spreadsheet_id
            )
        });
        debug!(spreadsheet_id = %created.spreadsheet_id, "spreadsheet created");

        Ok(CreatedSpreadsheet {
            spreadsheet_id: created.spreadsheet_id,
            url,
            sheets: created
                .sheets
                .into_iter()
                .map(|s| (s.properties.sheet_id, s.properties.title))
                .collect(),
        })
    }

    async fn put_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> ProviderResult<()> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.sheets_base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        );
        let body = ValueRange {
            range,
            major_dimension: "ROWS",
            values: rows,
        };
        let request = self
            .http_client
            .put(&url)
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        self.send(request).await.map(drop)
    }

    async fn post_batch(
        &self,
        spreadsheet_id: &str,
        requests: &[serde_json::Value],
    ) -> ProviderResult<()> {
        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.sheets_base_url,
            urlencoding::encode(spreadsheet_id)
        );
        let body = serde_json::json!({ "requests": requests });
        self.send(self.http_client.post(&url).json(&body))
            .await
            .map(drop)
    }

    async fn add_permission(&self, spreadsheet_id: &str, role: ShareRole) -> ProviderResult<()> {
        let url = format!(
            "{}/files/{}/permissions",
            self.drive_base_url,
            urlencoding::encode(spreadsheet_id)
        );
        let body = serde_json::json!({ "type": "anyone", "role": role.as_str() });
        self.send(self.http_client.post(&url).json(&body))
            .await
            .map(drop)
    }

    /// Sends an authenticated request and returns the body of a 2xx reply.
    async fn send(&self, request: reqwest::RequestBuilder) -> ProviderResult<String> {
        let token = self
            .access_token
            .read()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network("failed to read response").with_source(e))?;

        if status.is_success() {
            return Ok(body);
        }
        Err(classify_failure(status, retry_after, &body))
    }
}

impl SheetsApi for SheetsClient {
    fn create_spreadsheet<'a>(
        &'a self,
        title: &'a str,
        sheets: &'a [NewSheet],
    ) -> BoxFuture<'a, ProviderResult<CreatedSpreadsheet>> {
        Box::pin(self.create(title, sheets))
    }

    fn update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        rows: &'a [Vec<String>],
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.put_values(spreadsheet_id, range, rows))
    }

    fn batch_update<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        requests: &'a [serde_json::Value],
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.post_batch(spreadsheet_id, requests))
    }

    fn share<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        role: ShareRole,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.add_permission(spreadsheet_id, role))
    }

    fn set_access_token(&self, access_token: String) {
        match self.access_token.write() {
            Ok(mut token) => *token = access_token,
            Err(poisoned) => *poisoned.into_inner() = access_token,
        }
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    let message = if e.is_timeout() {
        "request timeout"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_builder() {
        return ProviderError::internal("failed to build request").with_source(e);
    } else {
        "request failed"
    };
    ProviderError::network(message).with_source(e)
}

/// Maps a non-2xx reply to an error code.
///
/// Only `error.message` from a Google error body is kept; the raw body is
/// never copied into the error.
pub fn classify_failure(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = parsed
        .as_ref()
        .and_then(|e| e.message.as_deref())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    let message = format!("HTTP {}: {}", status.as_u16(), message);
    let rate_limit_reason = parsed.as_ref().is_some_and(ErrorBody::is_rate_limit);

    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        StatusCode::FORBIDDEN if rate_limit_reason => ProviderError::rate_limited(message),
        StatusCode::FORBIDDEN => ProviderError::authorization(message),
        StatusCode::UNAUTHORIZED => ProviderError::authentication(message),
        StatusCode::NOT_FOUND => ProviderError::not_found(message),
        StatusCode::REQUEST_TIMEOUT => ProviderError::network(message),
        s if s.is_server_error() => ProviderError::server(message),
        s if s.is_client_error() => ProviderError::bad_request(message),
        _ => ProviderError::invalid_response(message),
    };

    match retry_after {
        Some(delay) => error.with_retry_after(delay),
        None => error,
    }
}

/// Reads `Retry-After` as delta-seconds or an HTTP date.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    (at - Utc::now()).to_std().ok()
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorReason>,
    #[serde(default)]
    details: Vec<ErrorReason>,
}

#[derive(Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: Option<String>,
}

impl ErrorBody {
    fn is_rate_limit(&self) -> bool {
        if self.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return true;
        }
        self.errors
            .iter()
            .chain(self.details.iter())
            .filter_map(|e| e.reason.as_deref())
            .any(|reason| {
                let folded = reason.replace('_', "").to_ascii_lowercase();
                folded == "ratelimitexceeded" || folded == "userratelimitexceeded"
            })
    }
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    properties: TitleProperties<'a>,
    sheets: Vec<SheetSpec<'a>>,
}

#[derive(Serialize)]
struct TitleProperties<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct SheetSpec<'a> {
    properties: SheetProperties<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties<'a> {
    sheet_id: i64,
    title: &'a str,
    grid_properties: GridProperties,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    row_count: u32,
    column_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'a str,
    values: &'a [Vec<String>],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    spreadsheet_id: String,
    #[serde(default)]
    spreadsheet_url: Option<String>,
    #[serde(default)]
    sheets: Vec<CreatedSheet>,
}

#[derive(Deserialize)]
struct CreatedSheet {
    properties: CreatedSheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSheetProperties {
    sheet_id: i64,
    title: String,
}

/// Builders for `batchUpdate` request objects.
pub mod requests {
    use serde_json::{Value, json};

    const HEADER_BLUE: (f64, f64, f64) = (0.2, 0.6, 0.9);

    fn color((red, green, blue): (f64, f64, f64)) -> Value {
        json!({ "red": red, "green": green, "blue": blue })
    }

    fn white() -> Value {
        color((1.0, 1.0, 1.0))
    }

    /// Restricts rows `[first_row, end_row)` of a column to `options`.
    pub fn dropdown(
        sheet_id: i64,
        column: usize,
        first_row: u32,
        end_row: u32,
        options: &[String],
    ) -> Value {
        let values: Vec<Value> = options
            .iter()
            .map(|v| json!({ "userEnteredValue": v }))
            .collect();
        json!({
            "setDataValidation": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": first_row,
                    "endRowIndex": end_row,
                    "startColumnIndex": column,
                    "endColumnIndex": column + 1,
                },
                "rule": {
                    "condition": { "type": "ONE_OF_LIST", "values": values },
                    "showCustomUi": true,
                    "strict": true,
                }
            }
        })
    }

    /// Blue background, bold white centered text on the first row.
    pub fn header_style(sheet_id: i64, columns: usize) -> Value {
        json!({
            "repeatCell": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": 0,
                    "endRowIndex": 1,
                    "startColumnIndex": 0,
                    "endColumnIndex": columns,
                },
                "cell": {
                    "userEnteredFormat": {
                        "backgroundColor": color(HEADER_BLUE),
                        "textFormat": { "bold": true, "foregroundColor": white() },
                        "horizontalAlignment": "CENTER",
                    }
                },
                "fields": "userEnteredFormat(backgroundColor,textFormat,horizontalAlignment)",
            }
        })
    }

    pub fn column_width(sheet_id: i64, column: usize, pixels: u32) -> Value {
        dimension_size(sheet_id, "COLUMNS", column, pixels)
    }

    pub fn row_height(sheet_id: i64, row: usize, pixels: u32) -> Value {
        dimension_size(sheet_id, "ROWS", row, pixels)
    }

    fn dimension_size(sheet_id: i64, dimension: &str, index: usize, pixels: u32) -> Value {
        json!({
            "updateDimensionProperties": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": dimension,
                    "startIndex": index,
                    "endIndex": index + 1,
                },
                "properties": { "pixelSize": pixels },
                "fields": "pixelSize",
            }
        })
    }

    /// Banner style for a title cell in the first column.
    pub fn title_cell(sheet_id: i64, row: usize) -> Value {
        cell_format(
            sheet_id,
            row,
            json!({
                "backgroundColor": color(HEADER_BLUE),
                "textFormat": { "bold": true, "foregroundColor": white(), "fontSize": 14 },
            }),
            "userEnteredFormat(backgroundColor,textFormat)",
        )
    }

    /// Bold, slightly larger text for a heading cell in the first column.
    pub fn heading_cell(sheet_id: i64, row: usize) -> Value {
        cell_format(
            sheet_id,
            row,
            json!({ "textFormat": { "bold": true, "fontSize": 12 } }),
            "userEnteredFormat.textFormat",
        )
    }

    fn cell_format(sheet_id: i64, row: usize, format: Value, fields: &str) -> Value {
        json!({
            "repeatCell": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": row,
                    "endRowIndex": row + 1,
                    "startColumnIndex": 0,
                    "endColumnIndex": 1,
                },
                "cell": { "userEnteredFormat": format },
                "fields": fields,
            }
        })
    }
}
