//! HTTP clients for the Google Drive and Sheets APIs.
//!
//! Both clients send the OAuth bearer token found in the environment
//! variable named by `google.token_env`. Minting and refreshing that token
//! is left to the deployment.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::GoogleConfig;
use crate::fetcher::TableSource;
use crate::uploader::{ImageStore, UploadPayload};

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct InsertedFile {
    id: String,
}

fn bearer_token(config: &GoogleConfig) -> Result<String, String> {
    std::env::var(&config.token_env)
        .map_err(|_| format!("access token variable {} is not set", config.token_env))
}

fn api_url(base: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = Url::parse(base).map_err(|e| format!("bad API url {}: {}", base, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("API url {} cannot take a path", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn ensure_success(resp: Response, what: &str) -> Result<Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(format!("{} failed status={}: {}", what, status, body.trim()))
}

/// Escape a value for a single-quoted Drive query string
fn quote_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// A1 range covering a whole sheet, whatever its title looks like
fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads the first worksheet of a spreadsheet found by file name
pub struct GoogleSheets {
    client: Client,
    config: GoogleConfig,
}

impl GoogleSheets {
    pub fn new(config: GoogleConfig) -> Self {
        GoogleSheets {
            client: Client::new(),
            config,
        }
    }

    async fn find_spreadsheet(&self, token: &str, name: &str) -> Result<String, String> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            quote_query_value(name),
            SPREADSHEET_MIME
        );
        let url = api_url(&self.config.drive_api, &["files"])?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id)"), ("pageSize", "1")])
            .send()
            .await
            .map_err(|e| format!("drive lookup of {} failed: {}", name, e))?;
        let list: FileList = ensure_success(resp, "drive lookup")
            .await?
            .json()
            .await
            .map_err(|e| format!("drive lookup returned bad json: {}", e))?;

        list.files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| format!("SpreadsheetNotFound: {}", name))
    }

    async fn first_sheet_title(&self, token: &str, id: &str) -> Result<String, String> {
        let url = api_url(&self.config.sheets_api, &["spreadsheets", id])?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await
            .map_err(|e| format!("spreadsheet metadata request failed: {}", e))?;
        let meta: SpreadsheetMeta = ensure_success(resp, "spreadsheet metadata")
            .await?
            .json()
            .await
            .map_err(|e| format!("spreadsheet metadata returned bad json: {}", e))?;

        meta.sheets
            .into_iter()
            .next()
            .map(|sheet| sheet.properties.title)
            .ok_or_else(|| "spreadsheet has no worksheets".to_string())
    }
}

#[async_trait]
impl TableSource for GoogleSheets {
    fn backend_tag(&self) -> &'static str {
        "google_sheets"
    }

    async fn worksheet_values(&self, resource: &str) -> Result<Vec<Vec<String>>, String> {
        let token = bearer_token(&self.config)?;
        let id = self.find_spreadsheet(&token, resource).await?;
        let title = self.first_sheet_title(&token, &id).await?;
        debug!("reading worksheet '{}' of {} ({})", title, resource, id);

        let range = sheet_range(&title);
        let url = api_url(
            &self.config.sheets_api,
            &["spreadsheets", id.as_str(), "values", range.as_str()],
        )?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await
            .map_err(|e| format!("values request failed: {}", e))?;
        let range: ValueRange = ensure_success(resp, "values request")
            .await?
            .json()
            .await
            .map_err(|e| format!("values request returned bad json: {}", e))?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

/// Stores images in a Drive folder through a resumable upload session
pub struct DriveUploader {
    client: Client,
    config: GoogleConfig,
}

impl DriveUploader {
    pub fn new(config: GoogleConfig) -> Self {
        DriveUploader {
            client: Client::new(),
            config,
        }
    }

    async fn open_session(
        &self,
        token: &str,
        name: &str,
        folder_id: &str,
        payload: &UploadPayload,
    ) -> Result<String, String> {
        let mut url = api_url(&self.config.upload_api, &["files"])?;
        url.query_pairs_mut().append_pair("uploadType", "resumable");

        let metadata = json!({
            "title": name,
            "mimeType": payload.content_type,
            "parents": [{ "id": folder_id }],
        });
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .header("X-Upload-Content-Type", payload.content_type.as_str())
            .header("X-Upload-Content-Length", payload.size().to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| format!("opening upload session failed: {}", e))?;
        let resp = ensure_success(resp, "opening upload session").await?;

        resp.headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| "upload session has no location".to_string())
    }
}

#[async_trait]
impl ImageStore for DriveUploader {
    fn backend_tag(&self) -> &'static str {
        "google_drive"
    }

    async fn upload(
        &self,
        name: &str,
        folder_id: &str,
        payload: &UploadPayload,
    ) -> Result<String, String> {
        let token = bearer_token(&self.config)?;
        let session = self.open_session(&token, name, folder_id, payload).await?;
        debug!("upload session for {} opened", name);

        let resp = self
            .client
            .put(session)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, payload.content_type.as_str())
            .body(payload.bytes.clone())
            .send()
            .await
            .map_err(|e| format!("sending {} failed: {}", name, e))?;
        let inserted: InsertedFile = ensure_success(resp, "upload")
            .await?
            .json()
            .await
            .map_err(|e| format!("upload returned bad json: {}", e))?;

        Ok(inserted.id)
    }
}
