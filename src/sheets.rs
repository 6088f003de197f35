//! Task persistence into a Google Sheets task list.
//!
//! Each submitted draft becomes one appended row. The append is not
//! idempotent, so it is never retried automatically: a failure goes back to
//! the user, who can press the submit button again.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RecoveryConfig;
use crate::errors::PersistenceError;
use crate::google_auth::TokenSource;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Durable storage for submitted tasks
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn append_task(
        &self,
        name: &str,
        description: &str,
        tag: &str,
    ) -> Result<(), PersistenceError>;
}

/// Row layout of the task list (columns A..L).
///
/// Task id and the planning columns are left empty for the sheet's owner to
/// fill in; the done flag starts as `FALSE`.
pub fn task_row(name: &str, description: &str, tag: &str, timestamp: &str) -> Vec<String> {
    vec![
        String::new(),
        name.to_string(),
        description.to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        tag.to_string(),
        "FALSE".to_string(),
        timestamp.to_string(),
        timestamp.to_string(),
    ]
}

/// [`TaskSink`] appending rows through the Sheets `values.append` API
pub struct GoogleSheetsTaskSink {
    client: reqwest::Client,
    auth: Arc<dyn TokenSource>,
    spreadsheet_id: String,
    range: String,
    breaker: CircuitBreaker,
}

impl GoogleSheetsTaskSink {
    pub fn new(
        client: reqwest::Client,
        auth: Arc<dyn TokenSource>,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
        recovery: &RecoveryConfig,
    ) -> Self {
        Self {
            client,
            auth,
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            breaker: CircuitBreaker::new("sheets", recovery),
        }
    }

    fn append_url(&self) -> String {
        format!(
            "{SHEETS_API_BASE}/{}/values/{}:append",
            self.spreadsheet_id, self.range
        )
    }

    async fn send_append(&self, row: Vec<String>) -> Result<Value, PersistenceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(self.append_url())
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(token)
            .json(&json!({ "values": [row] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Api(format!("{status}: {body}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TaskSink for GoogleSheetsTaskSink {
    async fn append_task(
        &self,
        name: &str,
        description: &str,
        tag: &str,
    ) -> Result<(), PersistenceError> {
        if self.breaker.is_open() {
            return Err(PersistenceError::CircuitOpen);
        }

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let row = task_row(name, description, tag, &timestamp);

        match self.send_append(row).await {
            Ok(body) => {
                self.breaker.record_success();
                let updated_range = body
                    .pointer("/updates/updatedRange")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                info!(range = updated_range, "Task appended to sheet");
                Ok(())
            }
            Err(e) => {
                self.breaker.record_failure();
                error!(error = %e, "Failed to append task to sheet");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_layout() {
        let row = task_row("Задача", "buy milk\ncall Alex", "#інше", "2025-01-02 03:04:05");
        assert_eq!(row.len(), 12);
        assert_eq!(row[0], "");
        assert_eq!(row[1], "Задача");
        assert_eq!(row[2], "buy milk\ncall Alex");
        assert!(row[3..8].iter().all(String::is_empty));
        assert_eq!(row[8], "#інше");
        assert_eq!(row[9], "FALSE");
        assert_eq!(row[10], "2025-01-02 03:04:05");
        assert_eq!(row[11], row[10]);
    }

    #[test]
    fn test_timestamp_format() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(7, 5, 0))
            .unwrap()
            .format(TIMESTAMP_FORMAT)
            .to_string();
        assert_eq!(ts, "2024-03-09 07:05:00");
    }
}
