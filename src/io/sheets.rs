//! Minimal Google Sheets client used to publish the report.
//!
//! Authentication follows the service-account flow through `yup_oauth2`; the
//! bearer token it hands back is then used against the Sheets v4 REST API.
//! Only the calls the export needs are implemented: open a spreadsheet by
//! key, look a worksheet up by title, clear ranges, grow the grid and write
//! values.

use std::fmt;
use std::fs;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};
use yup_oauth2::ServiceAccountAuthenticator;

use crate::config::CredentialSource;
use crate::error::{ReportError, Result};
use crate::flatten::{Cell, SheetTable};

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
const SCOPES: [&str; 2] = [
    "https://spreadsheets.google.com/feeds",
    "https://www.googleapis.com/auth/drive",
];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A service-account key file.
#[derive(Clone)]
pub struct ServiceAccountKey {
    inner: yup_oauth2::ServiceAccountKey,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.inner.client_email)
            .field("token_uri", &self.inner.token_uri)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl ServiceAccountKey {
    /// Reads the key from base64 text or from a JSON file.
    pub fn load(source: &CredentialSource) -> Result<Self> {
        let raw = match source {
            CredentialSource::Base64(encoded) => {
                let bytes = STANDARD.decode(encoded.trim())?;
                String::from_utf8(bytes).map_err(|err| {
                    ReportError::InvalidCredentials(format!("key is not UTF-8: {err}"))
                })?
            }
            CredentialSource::File(path) => fs::read_to_string(path)?,
        };
        Ok(Self {
            inner: serde_json::from_str(&raw)?,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.inner.client_email
    }

    pub fn token_uri(&self) -> &str {
        &self.inner.token_uri
    }
}

/// Authorised Sheets API client.
pub struct SheetsClient {
    http: Client,
    access_token: String,
    api_base: String,
}

impl SheetsClient {
    /// Exchanges the service-account key for an access token.
    ///
    /// The authenticator is async, so the exchange runs on a throwaway
    /// current-thread runtime.
    #[instrument(level = "info", skip_all, fields(client_email = %key.client_email()))]
    pub fn authorize(key: &ServiceAccountKey) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let token = runtime.block_on(async {
            let auth = ServiceAccountAuthenticator::builder(key.inner.clone())
                .build()
                .await?;
            Ok::<_, ReportError>(auth.token(&SCOPES).await?)
        })?;
        let access_token = token
            .token()
            .ok_or_else(|| {
                ReportError::InvalidCredentials("token endpoint returned no access token".into())
            })?
            .to_string();
        debug!("access token obtained");

        Ok(Self {
            http: build_http_client()?,
            access_token,
            api_base: SHEETS_API_BASE.to_string(),
        })
    }

    /// Builds a client around an existing token, talking to `api_base`.
    pub fn with_token(access_token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            access_token: access_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Opens a spreadsheet by its document key.
    #[instrument(level = "debug", skip(self))]
    pub fn open_by_key(&self, key: &str) -> Result<Spreadsheet<'_>> {
        let mut url = self.url(&["spreadsheets", key])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title,gridProperties)");

        let response = self.http.get(url).bearer_auth(&self.access_token).send()?;
        let metadata: SpreadsheetMetadata = check_status(response)?.json()?;

        Ok(Spreadsheet {
            client: self,
            key: key.to_string(),
            sheets: metadata
                .sheets
                .into_iter()
                .map(|sheet| sheet.properties)
                .collect(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base).map_err(|err| {
            ReportError::UnexpectedResponse(format!("invalid API base {}: {err}", self.api_base))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                ReportError::UnexpectedResponse(format!("API base {} cannot hold a path", self.api_base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn post(&self, url: Url, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()?;
        Ok(check_status(response)?.json()?)
    }

    fn put(&self, url: Url, body: &Value) -> Result<Value> {
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()?;
        Ok(check_status(response)?.json()?)
    }
}

fn build_http_client() -> Result<Client> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .unwrap_or_else(|_| "unreadable error body".to_string());
    Err(ReportError::SheetsApi {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub grid_properties: GridProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    #[serde(default)]
    pub row_count: u32,
    #[serde(default)]
    pub column_count: u32,
}

/// An opened spreadsheet document.
pub struct Spreadsheet<'a> {
    client: &'a SheetsClient,
    key: String,
    sheets: Vec<SheetProperties>,
}

impl<'a> Spreadsheet<'a> {
    /// Looks a worksheet up by its title.
    pub fn worksheet(&self, title: &str) -> Result<Worksheet<'a>> {
        self.sheets
            .iter()
            .find(|sheet| sheet.title == title)
            .map(|properties| Worksheet {
                client: self.client,
                key: self.key.clone(),
                properties: properties.clone(),
            })
            .ok_or_else(|| ReportError::WorksheetNotFound(title.to_string()))
    }
}

/// A worksheet inside an opened spreadsheet.
pub struct Worksheet<'a> {
    client: &'a SheetsClient,
    key: String,
    properties: SheetProperties,
}

impl Worksheet<'_> {
    pub fn title(&self) -> &str {
        &self.properties.title
    }

    /// Clears the given A1 ranges of this worksheet.
    pub fn batch_clear(&self, ranges: &[&str]) -> Result<()> {
        let ranges: Vec<String> = ranges
            .iter()
            .map(|range| a1_range(&self.properties.title, range))
            .collect();
        let url = self
            .client
            .url(&["spreadsheets", self.key.as_str(), "values:batchClear"])?;
        self.client.post(url, &json!({ "ranges": ranges }))?;
        Ok(())
    }

    /// Grows the grid so that `rows` rows and `columns` columns fit.
    fn ensure_size(&self, rows: u32, columns: u32) -> Result<()> {
        let grid = &self.properties.grid_properties;
        if rows <= grid.row_count && columns <= grid.column_count {
            return Ok(());
        }

        let body = json!({
            "requests": [{
                "updateSheetProperties": {
                    "properties": {
                        "sheetId": self.properties.sheet_id,
                        "gridProperties": {
                            "rowCount": rows.max(grid.row_count),
                            "columnCount": columns.max(grid.column_count),
                        }
                    },
                    "fields": "gridProperties.rowCount,gridProperties.columnCount",
                }
            }]
        });
        // The document key and the action share one path segment.
        let url = self
            .client
            .url(&["spreadsheets", format!("{}:batchUpdate", self.key).as_str()])?;
        self.client.post(url, &body)?;
        debug!(rows, columns, "worksheet grid resized");
        Ok(())
    }

    /// Writes the header and rows of `table` starting at `A1`.
    pub fn write_table(&self, table: &SheetTable) -> Result<()> {
        let values = table_values(table);
        let rows = values.len() as u32;
        let columns = table.columns.len() as u32;
        self.ensure_size(rows, columns)?;

        let range = a1_range(&self.properties.title, "A1");
        let mut url = self
            .client
            .url(&["spreadsheets", self.key.as_str(), "values", range.as_str()])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        self.client.put(
            url,
            &json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": values,
            }),
        )?;
        info!(worksheet = %self.properties.title, rows, "worksheet updated");
        Ok(())
    }
}

/// Header row followed by the data rows, as Sheets API values.
fn table_values(table: &SheetTable) -> Vec<Vec<Value>> {
    let header: Vec<Value> = table
        .columns
        .iter()
        .map(|column| Value::String(column.clone()))
        .collect();

    std::iter::once(header)
        .chain(
            table
                .rows
                .iter()
                .map(|row| row.iter().map(Cell::to_json).collect::<Vec<_>>()),
        )
        .collect()
}

/// Prefixes `range` with the quoted sheet title, e.g. `'Git_Raw'!A:T`.
fn a1_range(title: &str, range: &str) -> String {
    format!("'{}'!{}", title.replace('\'', "''"), range)
}
