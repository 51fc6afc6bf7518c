use super::RecordBackend;
use crate::models::value_text;
use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use sync_core::error::AppError;
use tokio::sync::Mutex;

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct AppendRequest<'a> {
    values: [&'a [Value]; 1],
}

/// A single worksheet of a Google spreadsheet, addressed through the
/// Sheets v4 values API with an OAuth bearer token.
pub struct SheetsBackend {
    client: Client,
    base_url: Url,
    spreadsheet_key: String,
    worksheet: String,
    access_token: Secret<String>,
}

impl SheetsBackend {
    pub fn new(
        client: Client,
        base_url: &str,
        spreadsheet_key: impl Into<String>,
        worksheet: impl Into<String>,
        access_token: Secret<String>,
    ) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid Sheets API URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Sheets API URL '{}' cannot be a base URL",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            spreadsheet_key: spreadsheet_key.into(),
            worksheet: worksheet.into(),
            access_token,
        })
    }

    /// A1 range on this worksheet, e.g. `'Transactions'!B2:B`.
    fn range(&self, cells: &str) -> String {
        format!("'{}'!{}", self.worksheet.replace('\'', "''"), cells)
    }

    fn values_url(&self, range: &str) -> Url {
        let mut url = self.base_url.clone();
        // checked in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_key.as_str(),
                "values",
                range,
            ]);
        }
        url
    }

    async fn get_values(&self, range: &str, query: &[(&str, &str)]) -> Result<ValueRange, AppError> {
        let response = self
            .client
            .get(self.values_url(range))
            .query(query)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        let response = AppError::check_response(response).await?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RecordBackend for SheetsBackend {
    async fn read_header(&self) -> Result<Vec<String>, AppError> {
        let range = self.get_values(&self.range("1:1"), &[]).await?;

        Ok(range
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(|cell| value_text(cell).unwrap_or_default())
            .collect())
    }

    async fn read_column(&self, name: &str) -> Result<Vec<String>, AppError> {
        let header = self.read_header().await?;
        let index = header.iter().position(|c| c == name).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "Column '{}' not found in worksheet '{}'",
                name,
                self.worksheet
            ))
        })?;
        let letter = column_letter(index);

        let range = self
            .get_values(
                &self.range(&format!("{letter}2:{letter}")),
                &[
                    ("majorDimension", "COLUMNS"),
                    ("valueRenderOption", "UNFORMATTED_VALUE"),
                ],
            )
            .await?;

        Ok(range
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(|cell| value_text(cell).unwrap_or_default())
            .collect())
    }

    async fn append_row(&self, values: Vec<Value>) -> Result<(), AppError> {
        let range = format!("{}:append", self.range("A1"));

        let response = self
            .client
            .post(self.values_url(&range))
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(self.access_token.expose_secret())
            .json(&AppendRequest {
                values: [values.as_slice()],
            })
            .send()
            .await?;
        AppError::check_response(response).await?;

        Ok(())
    }
}

/// Zero-based column index to A1 letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();

    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }

    letters.iter().rev().collect()
}

/// Mock record backend for testing.
pub struct MockRecordBackend {
    header: Vec<String>,
    rows: Mutex<Vec<Vec<Value>>>,
    conflicts_remaining: AtomicU32,
    append_attempts: AtomicU64,
    append_delay: Duration,
    rejects_appends: bool,
}

impl MockRecordBackend {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|c| c.to_string()).collect(),
            rows: Mutex::new(Vec::new()),
            conflicts_remaining: AtomicU32::new(0),
            append_attempts: AtomicU64::new(0),
            append_delay: Duration::ZERO,
            rejects_appends: false,
        }
    }

    pub fn with_rows(self, rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..self
        }
    }

    /// Reject the next `count` appends with a conflict.
    pub fn with_conflicts(self, count: u32) -> Self {
        self.conflicts_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Hold every append for `delay` before it lands.
    pub fn with_append_delay(self, delay: Duration) -> Self {
        Self {
            append_delay: delay,
            ..self
        }
    }

    /// Reject every append as unauthorized.
    pub fn rejecting_appends(self) -> Self {
        Self {
            rejects_appends: true,
            ..self
        }
    }

    /// Append calls made, including rejected ones.
    pub fn append_attempts(&self) -> u64 {
        self.append_attempts.load(Ordering::SeqCst)
    }

    pub async fn rows(&self) -> Vec<Vec<Value>> {
        self.rows.lock().await.clone()
    }

    /// Simulate a writer outside this process.
    pub async fn push_external_row(&self, row: Vec<Value>) {
        self.rows.lock().await.push(row);
    }
}

#[async_trait]
impl RecordBackend for MockRecordBackend {
    async fn read_header(&self) -> Result<Vec<String>, AppError> {
        Ok(self.header.clone())
    }

    async fn read_column(&self, name: &str) -> Result<Vec<String>, AppError> {
        let index = self.header.iter().position(|c| c == name).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("Column '{}' not found", name))
        })?;

        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .map(|row| row.get(index).and_then(value_text).unwrap_or_default())
            .collect())
    }

    async fn append_row(&self, values: Vec<Value>) -> Result<(), AppError> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.append_delay.is_zero() {
            tokio::time::sleep(self.append_delay).await;
        }

        if self.rejects_appends {
            tracing::info!("[MOCK] Append rejected as unauthorized");
            return Err(AppError::Unauthorized(anyhow::anyhow!("mock rejection")));
        }

        let conflicted = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            tracing::info!("[MOCK] Append rejected with conflict");
            return Err(AppError::Conflict(anyhow::anyhow!("mock conflict")));
        }

        self.rows.lock().await.push(values);
        Ok(())
    }
}
